//! Root-ancestor discovery over `parents` edges.
//!
//! A root ancestor is a person with no parents on record. The walk is
//! depth-first, lowest handle first, on an explicit stack so deep or cyclic
//! ancestry data cannot exhaust the call stack.

use std::collections::{BTreeSet, HashSet};

use super::{PersonHandle, RelationSource, RelationshipCache};
use crate::Result;

/// How a walk treats the shared visited set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkMode {
    /// Add every walked person to the visited set.
    Record,
    /// Stop at the first parent already in the visited set and make it the
    /// only root.
    Intersect,
}

enum Step {
    Enter(PersonHandle),
    Exit(PersonHandle),
}

/// Roots and visited people for one relation query. Never shared between
/// queries.
#[derive(Debug, Default)]
pub struct RootSearch {
    roots: BTreeSet<PersonHandle>,
    visited: HashSet<PersonHandle>,
}

impl RootSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots found so far, lowest handle first.
    #[cfg(test)]
    pub(crate) fn roots(&self) -> &BTreeSet<PersonHandle> {
        &self.roots
    }

    pub fn into_roots(self) -> BTreeSet<PersonHandle> {
        self.roots
    }

    #[cfg(test)]
    pub(crate) fn was_visited(&self, person: PersonHandle) -> bool {
        self.visited.contains(&person)
    }

    /// Walk the ancestry of `start`, collecting roots.
    ///
    /// In [`WalkMode::Intersect`] the walk returns the shared ancestor as soon
    /// as it reaches one, replacing every root collected so far. That ancestor
    /// is the first one met in traversal order, not necessarily the closest.
    pub async fn walk<S: RelationSource>(
        &mut self,
        cache: &RelationshipCache,
        source: &S,
        start: PersonHandle,
        mode: WalkMode,
    ) -> Result<Option<PersonHandle>> {
        let mut stack = vec![Step::Enter(start)];
        let mut path: HashSet<PersonHandle> = HashSet::new();
        let mut expanded: HashSet<PersonHandle> = HashSet::new();

        while let Some(step) = stack.pop() {
            let person = match step {
                Step::Exit(person) => {
                    path.remove(&person);
                    continue;
                }
                Step::Enter(person) => person,
            };

            if mode == WalkMode::Intersect && person != start && self.visited.contains(&person) {
                log::debug!("Shared ancestor {} found while walking from {}", person, start);
                self.roots.clear();
                self.roots.insert(person);
                return Ok(Some(person));
            }

            if path.contains(&person) {
                log::warn!(
                    "Ancestry cycle through person {} while walking from {}; not descending again",
                    person,
                    start
                );
                continue;
            }

            // Reached again through another line (pedigree collapse)
            if !expanded.insert(person) {
                continue;
            }

            if mode == WalkMode::Record {
                self.visited.insert(person);
            }

            let record = cache.get(source, person).await?;
            if record.is_root() {
                self.roots.insert(person);
                continue;
            }

            path.insert(person);
            stack.push(Step::Exit(person));
            for &parent in record.parents().iter().rev() {
                stack.push(Step::Enter(parent));
            }
        }

        Ok(None)
    }
}
