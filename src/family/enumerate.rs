//! Bounded ancestor/descendant enumeration.

use std::collections::{BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{PersonHandle, RelationSource, RelationshipCache};
use crate::Result;

/// Which edges an enumeration follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ancestors,
    Descendants,
}

/// What one step of the generation budget means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    /// One step per generation: `ancestors(p, 2)` is parents and grandparents.
    #[default]
    Levels,
    /// One step per expanded person, FIFO from the start person. With more
    /// than one parent or child per person this reaches fewer generations
    /// than the count suggests.
    Expansions,
}

/// Everyone reached from `start` within `generations` steps, excluding
/// `start` itself.
pub async fn enumerate<S: RelationSource>(
    cache: &RelationshipCache,
    source: &S,
    start: PersonHandle,
    generations: u32,
    direction: Direction,
    mode: GenerationMode,
) -> Result<BTreeSet<PersonHandle>> {
    let reached = match mode {
        GenerationMode::Levels => by_levels(cache, source, start, generations, direction).await?,
        GenerationMode::Expansions => {
            by_expansions(cache, source, start, generations, direction).await?
        }
    };
    log::debug!(
        "{:?} of {} within {} generations ({:?}): {} people",
        direction,
        start,
        generations,
        mode,
        reached.len()
    );
    Ok(reached)
}

async fn by_levels<S: RelationSource>(
    cache: &RelationshipCache,
    source: &S,
    start: PersonHandle,
    generations: u32,
    direction: Direction,
) -> Result<BTreeSet<PersonHandle>> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    let mut result = BTreeSet::new();

    queue.push_back((start, 0u32));
    visited.insert(start);

    while let Some((person, depth)) = queue.pop_front() {
        if depth >= generations {
            continue;
        }

        let record = cache.get(source, person).await?;
        for &next in record.neighbours(direction) {
            if visited.insert(next) {
                queue.push_back((next, depth + 1));
                result.insert(next);
            }
        }
    }

    Ok(result)
}

async fn by_expansions<S: RelationSource>(
    cache: &RelationshipCache,
    source: &S,
    start: PersonHandle,
    generations: u32,
    direction: Direction,
) -> Result<BTreeSet<PersonHandle>> {
    let mut queue = VecDeque::from([start]);
    let mut result = BTreeSet::new();
    let mut steps = 0u32;

    while steps < generations {
        let Some(person) = queue.pop_front() else {
            break;
        };

        let record = cache.get(source, person).await?;
        for &next in record.neighbours(direction) {
            if next != start {
                result.insert(next);
            }
            queue.push_back(next);
        }
        steps += 1;
    }

    Ok(result)
}
