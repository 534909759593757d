//! Cousinship and level of removal between two people.

use serde::{Deserialize, Serialize};

use super::ancestry::{RootSearch, WalkMode};
use super::generation::generation_below;
use super::{PersonHandle, RelationSource, RelationshipCache};
use crate::Result;

/// Kinship degree between two people. `-1` in both fields means no relation
/// was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BiologicalRelation {
    /// 0 for siblings (and direct lines), 1 for first cousins, ...
    pub cousinship: i32,
    /// Difference in generations below the shared root.
    pub level_of_removal: i32,
}

impl BiologicalRelation {
    pub const UNRELATED: BiologicalRelation = BiologicalRelation {
        cousinship: -1,
        level_of_removal: -1,
    };

    pub fn new(cousinship: i32, level_of_removal: i32) -> Self {
        Self {
            cousinship,
            level_of_removal,
        }
    }

    /// Combine the generations of both people below a shared root.
    ///
    /// Direct lines, where one person is the root itself, report cousinship 0.
    pub fn from_generations(first: Option<u32>, second: Option<u32>) -> Self {
        let (Some(first), Some(second)) = (first, second) else {
            return Self::UNRELATED;
        };
        let (first, second) = (first as i32, second as i32);
        Self {
            cousinship: (first.min(second) - 1).max(0),
            level_of_removal: (first - second).abs(),
        }
    }

    pub fn is_related(&self) -> bool {
        *self != Self::UNRELATED
    }
}

/// Compute the relation between `first` and `second`.
///
/// Both people must already be known to the store; the caller checks that.
/// Candidate roots are tried lowest handle first and the first root below
/// which both people are found decides the result.
pub async fn find_relation<S: RelationSource>(
    cache: &RelationshipCache,
    source: &S,
    first: PersonHandle,
    second: PersonHandle,
) -> Result<BiologicalRelation> {
    let mut search = RootSearch::new();
    search.walk(cache, source, first, WalkMode::Record).await?;
    search.walk(cache, source, second, WalkMode::Intersect).await?;

    let roots = search.into_roots();
    if roots.is_empty() {
        log::debug!("No root ancestors for {} and {}", first, second);
        return Ok(BiologicalRelation::UNRELATED);
    }

    let mut first_generation = None;
    let mut second_generation = None;
    for &root in &roots {
        first_generation = generation_below(cache, source, root, first).await?;
        second_generation = generation_below(cache, source, root, second).await?;
        if first_generation.is_some() && second_generation.is_some() {
            log::debug!(
                "Root {} places {} at generation {:?} and {} at {:?}",
                root,
                first,
                first_generation,
                second,
                second_generation
            );
            break;
        }
    }

    Ok(BiologicalRelation::from_generations(first_generation, second_generation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::family::testing::{h, MemoryStore};

    #[test]
    fn test_from_generations() {
        assert_eq!(BiologicalRelation::from_generations(Some(0), Some(0)), BiologicalRelation::new(0, 0));
        assert_eq!(BiologicalRelation::from_generations(Some(1), Some(1)), BiologicalRelation::new(0, 0));
        assert_eq!(BiologicalRelation::from_generations(Some(2), Some(2)), BiologicalRelation::new(1, 0));
        assert_eq!(BiologicalRelation::from_generations(Some(1), Some(2)), BiologicalRelation::new(0, 1));
        assert_eq!(BiologicalRelation::from_generations(Some(3), Some(2)), BiologicalRelation::new(1, 1));
        assert_eq!(BiologicalRelation::from_generations(Some(0), Some(2)), BiologicalRelation::new(0, 2));
        assert_eq!(BiologicalRelation::from_generations(Some(3), Some(0)), BiologicalRelation::new(0, 3));
        assert_eq!(BiologicalRelation::from_generations(None, Some(2)), BiologicalRelation::UNRELATED);
        assert_eq!(BiologicalRelation::from_generations(Some(1), None), BiologicalRelation::UNRELATED);
        assert!(!BiologicalRelation::UNRELATED.is_related());
    }

    /// 1 -> {2, 3}; 2 -> 4; 3 -> {5, 6}; 7 stands alone.
    fn cousins() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_people(7);
        store.link_parent(h(1), h(2));
        store.link_parent(h(1), h(3));
        store.link_parent(h(2), h(4));
        store.link_parent(h(3), h(5));
        store.link_parent(h(3), h(6));
        store
    }

    async fn relation(store: &MemoryStore, a: i64, b: i64) -> BiologicalRelation {
        let cache = RelationshipCache::new();
        find_relation(&cache, store, h(a), h(b)).await.unwrap()
    }

    #[tokio::test]
    async fn test_self_relation() {
        let store = cousins();
        assert_eq!(relation(&store, 4, 4).await, BiologicalRelation::new(0, 0));
        assert_eq!(relation(&store, 1, 1).await, BiologicalRelation::new(0, 0));
        assert_eq!(relation(&store, 7, 7).await, BiologicalRelation::new(0, 0));
    }

    #[tokio::test]
    async fn test_siblings() {
        let store = cousins();
        assert_eq!(relation(&store, 5, 6).await, BiologicalRelation::new(0, 0));
        assert_eq!(relation(&store, 2, 3).await, BiologicalRelation::new(0, 0));
    }

    #[tokio::test]
    async fn test_first_cousins() {
        let store = cousins();
        assert_eq!(relation(&store, 4, 5).await, BiologicalRelation::new(1, 0));
        assert_eq!(relation(&store, 6, 4).await, BiologicalRelation::new(1, 0));
    }

    #[tokio::test]
    async fn test_uncle_and_niece() {
        let store = cousins();
        assert_eq!(relation(&store, 2, 5).await, BiologicalRelation::new(0, 1));
        assert_eq!(relation(&store, 6, 2).await, BiologicalRelation::new(0, 1));
    }

    #[tokio::test]
    async fn test_direct_line() {
        let store = cousins();
        assert_eq!(relation(&store, 1, 4).await, BiologicalRelation::new(0, 2));
        assert_eq!(relation(&store, 3, 5).await, BiologicalRelation::new(0, 1));
    }

    #[tokio::test]
    async fn test_disjoint_families() {
        let store = cousins();
        assert_eq!(relation(&store, 4, 7).await, BiologicalRelation::UNRELATED);
        assert_eq!(relation(&store, 7, 5).await, BiologicalRelation::UNRELATED);
    }

    #[tokio::test]
    async fn test_cyclic_ancestry_terminates() {
        let store = MemoryStore::new();
        store.add_people(3);
        store.link_parent(h(1), h(2));
        store.link_parent(h(2), h(1));
        assert_eq!(relation(&store, 1, 3).await, BiologicalRelation::UNRELATED);
    }
}
