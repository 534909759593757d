//! Family tree facade: owns the relationship cache, records relationships in
//! the store and answers kinship queries.

use std::collections::BTreeSet;

use serde::Serialize;
use tokio::sync::Mutex;

use super::enumerate::{enumerate, Direction, GenerationMode};
use super::relation::{find_relation, BiologicalRelation};
use super::{
    NewPerson, PersonDirectory, PersonHandle, PersonRecord, RelationSource, RelationshipCache,
    RelationshipChange, RelationshipKind, RelationshipWriter,
};
use crate::{KinshipError, Result};

/// A person together with the records of their immediate relatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FamilySummary {
    pub person: PersonRecord,
    pub parents: Vec<PersonRecord>,
    pub children: Vec<PersonRecord>,
    pub partner: Option<PersonRecord>,
    pub previous_partners: Vec<PersonRecord>,
}

/// Entry point of the engine.
///
/// The cache lives as long as the tree and is never evicted; one tree per
/// long-lived service or per session.
///
/// Recording operations run one at a time: each holds `write_gate` across its
/// refresh, store write and cache update.
pub struct FamilyTree<S> {
    store: S,
    cache: RelationshipCache,
    generation_mode: GenerationMode,
    write_gate: Mutex<()>,
}

impl<S> FamilyTree<S>
where
    S: RelationSource + PersonDirectory + RelationshipWriter,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: RelationshipCache::new(),
            generation_mode: GenerationMode::default(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn with_generation_mode(mut self, mode: GenerationMode) -> Self {
        self.generation_mode = mode;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn cache(&self) -> &RelationshipCache {
        &self.cache
    }

    pub fn generation_mode(&self) -> GenerationMode {
        self.generation_mode
    }

    /// Create a person in the store.
    pub async fn add_person(&self, person: &NewPerson) -> Result<PersonHandle> {
        if person.name.trim().is_empty() {
            return Err(KinshipError::InvalidInput("name cannot be empty".to_string()));
        }
        let handle = self.store.add_person(person).await?;
        log::info!("Added person {} ({})", handle, person.name.trim());
        Ok(handle)
    }

    /// Record `child` as a child of `parent`, and of the parent's active
    /// partner if there is one.
    pub async fn record_child(&self, parent: PersonHandle, child: PersonHandle) -> Result<()> {
        self.validate_pair(parent, child).await?;
        let _writing = self.write_gate.lock().await;

        let parent_record = self.cache.refresh(&self.store, parent).await?;
        self.cache.refresh(&self.store, child).await?;

        let co_parent = parent_record.partner().filter(|&p| p != child);
        let mut changes = vec![RelationshipChange::new(parent, child, RelationshipKind::ParentChild)];
        if let Some(co_parent) = co_parent {
            self.cache.refresh(&self.store, co_parent).await?;
            changes.push(RelationshipChange::new(co_parent, child, RelationshipKind::ParentChild));
        }

        self.store.record_relationships(&changes).await?;

        for change in &changes {
            self.cache.update(change.person1, |record| record.add_child(change.person2));
            self.cache.update(change.person2, |record| record.add_parent(change.person1));
        }

        match co_parent {
            Some(co_parent) => log::info!(
                "Recorded {} as child of {} and partner {}",
                child,
                parent,
                co_parent
            ),
            None => log::info!("Recorded {} as child of {}", child, parent),
        }
        Ok(())
    }

    /// Record an active partnership between `first` and `second`.
    pub async fn record_partnering(&self, first: PersonHandle, second: PersonHandle) -> Result<()> {
        self.validate_pair(first, second).await?;
        let _writing = self.write_gate.lock().await;

        let first_record = self.cache.refresh(&self.store, first).await?;
        let second_record = self.cache.refresh(&self.store, second).await?;

        if first_record.partner() == Some(second) && second_record.partner() == Some(first) {
            log::debug!("{} and {} are already partners", first, second);
            return Ok(());
        }
        for (record, other) in [(&first_record, second), (&second_record, first)] {
            if let Some(current) = record.partner().filter(|&p| p != other) {
                return Err(KinshipError::InvalidInput(format!(
                    "person {} already has an active partner ({})",
                    record.person(),
                    current
                )));
            }
        }

        self.store
            .record_relationships(&[RelationshipChange::new(first, second, RelationshipKind::Partner)])
            .await?;

        self.cache.update(first, |record| record.set_partner(second));
        self.cache.update(second, |record| record.set_partner(first));
        log::info!("Recorded partnership of {} and {}", first, second);
        Ok(())
    }

    /// End the active partnership between `first` and `second`.
    ///
    /// Dissolving an already dissolved partnership does nothing.
    pub async fn record_dissolution(&self, first: PersonHandle, second: PersonHandle) -> Result<()> {
        self.validate_pair(first, second).await?;
        let _writing = self.write_gate.lock().await;

        let first_record = self.cache.refresh(&self.store, first).await?;
        self.cache.refresh(&self.store, second).await?;

        if first_record.partner() != Some(second) {
            if first_record.previous_partners().contains(&second) {
                log::debug!("Partnership of {} and {} already dissolved", first, second);
                return Ok(());
            }
            return Err(KinshipError::InvalidInput(format!(
                "persons {} and {} are not partners",
                first, second
            )));
        }

        self.store
            .record_relationships(&[RelationshipChange::new(
                first,
                second,
                RelationshipKind::Dissolution,
            )])
            .await?;

        self.cache.update(first, |record| record.dissolve_partner(second));
        self.cache.update(second, |record| record.dissolve_partner(first));
        log::info!("Recorded dissolution of {} and {}", first, second);
        Ok(())
    }

    /// Cousinship and level of removal between two people.
    pub async fn find_relation(
        &self,
        first: PersonHandle,
        second: PersonHandle,
    ) -> Result<BiologicalRelation> {
        self.cache.ensure_known(&self.store, first).await?;
        self.cache.ensure_known(&self.store, second).await?;
        find_relation(&self.cache, &self.store, first, second).await
    }

    /// Ancestors of `person` within `generations`, ordered by handle.
    pub async fn ancestors(&self, person: PersonHandle, generations: u32) -> Result<Vec<PersonRecord>> {
        self.relatives(person, generations, Direction::Ancestors).await
    }

    /// Descendants of `person` within `generations`, ordered by handle.
    pub async fn descendants(&self, person: PersonHandle, generations: u32) -> Result<Vec<PersonRecord>> {
        self.relatives(person, generations, Direction::Descendants).await
    }

    /// The person's record with parents, children and partners resolved.
    pub async fn describe(&self, person: PersonHandle) -> Result<FamilySummary> {
        self.cache.ensure_known(&self.store, person).await?;
        let record = self.cache.get(&self.store, person).await?;

        let mut wanted: BTreeSet<PersonHandle> = BTreeSet::from([person]);
        wanted.extend(record.parents());
        wanted.extend(record.children());
        wanted.extend(record.partner());
        wanted.extend(record.previous_partners());
        let people = self.store.fetch_persons(&wanted).await?;

        let pick = |handles: &BTreeSet<PersonHandle>| -> Vec<PersonRecord> {
            people
                .iter()
                .filter(|p| handles.contains(&p.id))
                .cloned()
                .collect()
        };
        let person_record = people
            .iter()
            .find(|p| p.id == person)
            .cloned()
            .ok_or(KinshipError::PersonNotFound(person))?;

        Ok(FamilySummary {
            person: person_record,
            parents: pick(record.parents()),
            children: pick(record.children()),
            partner: record
                .partner()
                .and_then(|partner| people.iter().find(|p| p.id == partner).cloned()),
            previous_partners: pick(record.previous_partners()),
        })
    }

    async fn relatives(
        &self,
        person: PersonHandle,
        generations: u32,
        direction: Direction,
    ) -> Result<Vec<PersonRecord>> {
        self.cache.ensure_known(&self.store, person).await?;
        let reached = enumerate(
            &self.cache,
            &self.store,
            person,
            generations,
            direction,
            self.generation_mode,
        )
        .await?;
        if reached.is_empty() {
            return Ok(Vec::new());
        }
        self.store.fetch_persons(&reached).await
    }

    async fn validate_pair(&self, first: PersonHandle, second: PersonHandle) -> Result<()> {
        if first == second {
            return Err(KinshipError::InvalidInput(format!(
                "a relationship needs two different people, got {} twice",
                first
            )));
        }
        for person in [first, second] {
            if !self.store.person_exists(person).await? {
                return Err(KinshipError::PersonNotFound(person));
            }
        }
        Ok(())
    }
}
