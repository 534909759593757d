//! Family relationship graph engine.
//!
//! Per-person relationship records are cached in memory and lazily filled from
//! a [`RelationSource`]. Traversals built on the cache answer kinship queries:
//! root-ancestor discovery, generation depth, cousinship/removal degree and
//! bounded ancestor/descendant enumeration.

pub mod ancestry;
pub mod cache;
pub mod enumerate;
pub mod generation;
pub mod relation;
pub mod tree;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::RelationshipCache;
pub use enumerate::{Direction, GenerationMode};
pub use relation::BiologicalRelation;
pub use tree::{FamilySummary, FamilyTree};

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{KinshipError, Result};

/// Opaque identifier of a person in the store. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonHandle(i64);

impl PersonHandle {
    /// Validate a raw store identifier.
    pub fn new(raw: i64) -> Result<Self> {
        if raw <= 0 {
            return Err(KinshipError::InvalidInput(format!(
                "person handle must be positive, got {}",
                raw
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PersonHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PersonHandle {
    type Err = KinshipError;

    fn from_str(s: &str) -> Result<Self> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| KinshipError::InvalidInput(format!("not a person handle: {}", s)))?;
        Self::new(raw)
    }
}

/// Snapshot of one person's immediate relations.
///
/// `partner` and `previous_partners` never overlap: dissolving a partnership
/// moves the handle across, re-partnering moves it back. Symmetry between two
/// records (A lists B as parent, B lists A as child) is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    person: PersonHandle,
    parents: BTreeSet<PersonHandle>,
    children: BTreeSet<PersonHandle>,
    partner: Option<PersonHandle>,
    previous_partners: BTreeSet<PersonHandle>,
}

impl RelationshipRecord {
    /// A known person with no recorded relations.
    pub fn new(person: PersonHandle) -> Self {
        Self {
            person,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
            partner: None,
            previous_partners: BTreeSet::new(),
        }
    }

    pub fn person(&self) -> PersonHandle {
        self.person
    }

    pub fn parents(&self) -> &BTreeSet<PersonHandle> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<PersonHandle> {
        &self.children
    }

    pub fn partner(&self) -> Option<PersonHandle> {
        self.partner
    }

    pub fn previous_partners(&self) -> &BTreeSet<PersonHandle> {
        &self.previous_partners
    }

    /// True when no parents are on record.
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn add_parent(&mut self, parent: PersonHandle) -> bool {
        self.parents.insert(parent)
    }

    pub fn add_child(&mut self, child: PersonHandle) -> bool {
        self.children.insert(child)
    }

    /// Make `partner` the active partner.
    ///
    /// Returns false if a different partner is already active. A former
    /// partner being re-partnered leaves `previous_partners`.
    pub fn set_partner(&mut self, partner: PersonHandle) -> bool {
        match self.partner {
            Some(current) if current == partner => true,
            Some(_) => false,
            None => {
                self.previous_partners.remove(&partner);
                self.partner = Some(partner);
                true
            }
        }
    }

    /// Record a dissolved partnership that is not the active one.
    pub fn add_previous_partner(&mut self, partner: PersonHandle) -> bool {
        if self.partner == Some(partner) {
            return false;
        }
        self.previous_partners.insert(partner)
    }

    /// End the active partnership with `partner`.
    ///
    /// Returns false when `partner` is not the active partner, which makes
    /// repeated dissolution a no-op.
    pub fn dissolve_partner(&mut self, partner: PersonHandle) -> bool {
        if self.partner != Some(partner) {
            return false;
        }
        self.partner = None;
        self.previous_partners.insert(partner);
        true
    }

    /// Edges followed when walking in `direction`.
    pub fn neighbours(&self, direction: Direction) -> &BTreeSet<PersonHandle> {
        match direction {
            Direction::Ancestors => &self.parents,
            Direction::Descendants => &self.children,
        }
    }
}

/// Full person record as held by the person directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRecord {
    pub id: PersonHandle,
    pub name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub date_of_death: Option<NaiveDate>,
    pub place_of_death: Option<String>,
    pub occupation: Option<String>,
}

/// Fields for creating a person. Only `name` is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPerson {
    pub name: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub place_of_birth: Option<String>,
    pub date_of_death: Option<NaiveDate>,
    pub place_of_death: Option<String>,
    pub occupation: Option<String>,
}

impl NewPerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Kind of row written to the relationship store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// `person1` is a parent of `person2`
    ParentChild,
    /// `person1` and `person2` become active partners
    Partner,
    /// The active partnership between `person1` and `person2` ends
    Dissolution,
}

/// A single relationship write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipChange {
    pub person1: PersonHandle,
    pub person2: PersonHandle,
    pub kind: RelationshipKind,
}

impl RelationshipChange {
    pub fn new(person1: PersonHandle, person2: PersonHandle, kind: RelationshipKind) -> Self {
        Self {
            person1,
            person2,
            kind,
        }
    }
}

/// Read side of the relationship store.
#[async_trait]
pub trait RelationSource: Send + Sync {
    /// Whether the store knows this person at all.
    async fn person_exists(&self, person: PersonHandle) -> Result<bool>;

    /// Immediate relations of `person`, or `None` when nothing is on file.
    async fn fetch_relations(&self, person: PersonHandle) -> Result<Option<RelationshipRecord>>;
}

/// Resolves handles to full person records.
#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// Records for every known handle in `persons`, ordered by handle.
    async fn fetch_persons(&self, persons: &BTreeSet<PersonHandle>) -> Result<Vec<PersonRecord>>;
}

/// Write side of the relationship store.
#[async_trait]
pub trait RelationshipWriter: Send + Sync {
    async fn add_person(&self, person: &NewPerson) -> Result<PersonHandle>;

    /// Apply all changes atomically.
    async fn record_relationships(&self, changes: &[RelationshipChange]) -> Result<()>;
}
