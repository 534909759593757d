//! In-memory store for engine tests: counts fetches and can be switched off
//! to simulate an unavailable collaborator.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    NewPerson, PersonDirectory, PersonHandle, PersonRecord, RelationSource, RelationshipChange,
    RelationshipKind, RelationshipRecord, RelationshipWriter,
};
use crate::{KinshipError, Result};

pub(crate) fn h(raw: i64) -> PersonHandle {
    PersonHandle::new(raw).unwrap()
}

#[derive(Default)]
struct State {
    persons: BTreeMap<PersonHandle, PersonRecord>,
    relations: HashMap<PersonHandle, RelationshipRecord>,
    next_id: i64,
}

impl State {
    fn record_mut(&mut self, person: PersonHandle) -> &mut RelationshipRecord {
        self.relations
            .entry(person)
            .or_insert_with(|| RelationshipRecord::new(person))
    }
}

#[derive(Default)]
pub(crate) struct MemoryStore {
    state: Mutex<State>,
    fetches: AtomicUsize,
    writes: AtomicUsize,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add people with handles continuing from the last one, named `P<id>`.
    pub fn add_people(&self, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.next_id += 1;
            let id = h(state.next_id);
            state.persons.insert(id, person_record(id, &format!("P{}", id)));
        }
    }

    /// Write a parent/child edge directly, bypassing the engine.
    pub fn link_parent(&self, parent: PersonHandle, child: PersonHandle) {
        let mut state = self.state.lock().unwrap();
        state.record_mut(parent).add_child(child);
        state.record_mut(child).add_parent(parent);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Relations as stored, regardless of any cache.
    pub fn stored(&self, person: PersonHandle) -> RelationshipRecord {
        let state = self.state.lock().unwrap();
        state
            .relations
            .get(&person)
            .cloned()
            .unwrap_or_else(|| RelationshipRecord::new(person))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KinshipError::SourceUnavailable("memory store switched off".to_string()));
        }
        Ok(())
    }
}

fn person_record(id: PersonHandle, name: &str) -> PersonRecord {
    PersonRecord {
        id,
        name: name.to_string(),
        gender: None,
        date_of_birth: None,
        place_of_birth: None,
        date_of_death: None,
        place_of_death: None,
        occupation: None,
    }
}

#[async_trait]
impl RelationSource for MemoryStore {
    async fn person_exists(&self, person: PersonHandle) -> Result<bool> {
        self.check_available()?;
        Ok(self.state.lock().unwrap().persons.contains_key(&person))
    }

    async fn fetch_relations(&self, person: PersonHandle) -> Result<Option<RelationshipRecord>> {
        self.check_available()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state
            .relations
            .get(&person)
            .filter(|record| **record != RelationshipRecord::new(person))
            .cloned())
    }
}

#[async_trait]
impl PersonDirectory for MemoryStore {
    async fn fetch_persons(&self, persons: &BTreeSet<PersonHandle>) -> Result<Vec<PersonRecord>> {
        self.check_available()?;
        let state = self.state.lock().unwrap();
        Ok(persons
            .iter()
            .filter_map(|id| state.persons.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl RelationshipWriter for MemoryStore {
    async fn add_person(&self, person: &NewPerson) -> Result<PersonHandle> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = h(state.next_id);
        state.persons.insert(id, person_record(id, &person.name));
        Ok(id)
    }

    async fn record_relationships(&self, changes: &[RelationshipChange]) -> Result<()> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        for change in changes {
            let (a, b) = (change.person1, change.person2);
            match change.kind {
                RelationshipKind::ParentChild => {
                    state.record_mut(a).add_child(b);
                    state.record_mut(b).add_parent(a);
                }
                RelationshipKind::Partner => {
                    state.record_mut(a).set_partner(b);
                    state.record_mut(b).set_partner(a);
                }
                RelationshipKind::Dissolution => {
                    state.record_mut(a).dissolve_partner(b);
                    state.record_mut(b).dissolve_partner(a);
                }
            }
        }
        Ok(())
    }
}
