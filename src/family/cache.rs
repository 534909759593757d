//! In-memory cache of relationship records.
//!
//! Entries are filled on first access from a [`RelationSource`] and replaced
//! wholesale on refresh. Nothing is ever evicted, so memory grows with the
//! number of distinct people touched over the owner's lifetime.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{PersonHandle, RelationSource, RelationshipRecord};
use crate::{KinshipError, Result};

/// Person handle -> relationship record, behind a single coarse lock.
///
/// The lock is never held across an `.await`: fetches run unlocked and only
/// the final insert takes the write lock.
pub struct RelationshipCache {
    entries: RwLock<HashMap<PersonHandle, RelationshipRecord>>,
}

impl RelationshipCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PersonHandle, RelationshipRecord>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<PersonHandle, RelationshipRecord>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of cached records.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn contains(&self, person: PersonHandle) -> bool {
        self.read().contains_key(&person)
    }

    /// Cached record without touching the source.
    pub fn peek(&self, person: PersonHandle) -> Option<RelationshipRecord> {
        self.read().get(&person).cloned()
    }

    /// Record for `person`, fetched from `source` on a miss.
    ///
    /// A source with nothing on file yields an empty record, which is cached
    /// like any other. On fetch failure the cache is left untouched.
    pub async fn get<S: RelationSource>(
        &self,
        source: &S,
        person: PersonHandle,
    ) -> Result<RelationshipRecord> {
        if let Some(record) = self.peek(person) {
            return Ok(record);
        }

        let fetched = Self::fetch(source, person).await?;

        // Another caller may have filled or refreshed the entry meanwhile;
        // theirs is at least as fresh as ours.
        let mut entries = self.write();
        let record = entries.entry(person).or_insert(fetched);
        Ok(record.clone())
    }

    /// Re-fetch `person` from `source` and replace the cached record.
    pub async fn refresh<S: RelationSource>(
        &self,
        source: &S,
        person: PersonHandle,
    ) -> Result<RelationshipRecord> {
        let fetched = Self::fetch(source, person).await?;
        self.write().insert(person, fetched.clone());
        log::debug!("Refreshed relationship record for person {}", person);
        Ok(fetched)
    }

    /// Apply a local mutation to a cached record.
    ///
    /// Used after a successful store write to layer the new relation on top
    /// of the freshly refreshed record. Creates an empty record if absent.
    pub fn update<F, T>(&self, person: PersonHandle, mutate: F) -> T
    where
        F: FnOnce(&mut RelationshipRecord) -> T,
    {
        let mut entries = self.write();
        let record = entries
            .entry(person)
            .or_insert_with(|| RelationshipRecord::new(person));
        mutate(record)
    }

    /// Fail with [`KinshipError::PersonNotFound`] unless `person` is cached or
    /// known to `source`.
    pub async fn ensure_known<S: RelationSource>(&self, source: &S, person: PersonHandle) -> Result<()> {
        if self.contains(person) {
            return Ok(());
        }
        if source.person_exists(person).await? {
            Ok(())
        } else {
            Err(KinshipError::PersonNotFound(person))
        }
    }

    async fn fetch<S: RelationSource>(source: &S, person: PersonHandle) -> Result<RelationshipRecord> {
        let fetched = source.fetch_relations(person).await?;
        Ok(fetched.unwrap_or_else(|| {
            log::debug!("No relations on file for person {}", person);
            RelationshipRecord::new(person)
        }))
    }
}

impl Default for RelationshipCache {
    fn default() -> Self {
        Self::new()
    }
}
