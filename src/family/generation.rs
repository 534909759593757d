//! Generation depth of a person below a root ancestor.

use std::collections::HashSet;

use super::{PersonHandle, RelationSource, RelationshipCache};
use crate::Result;

/// Depth of `target` below `root` along `children` edges, depth-first and
/// lowest handle first.
///
/// The root itself is generation 0 and its children generation 1. A node
/// matches when it is the target or lists the target among its children; in
/// the latter case the child's generation is returned. `None` means the
/// target is not a descendant of `root`.
pub async fn generation_below<S: RelationSource>(
    cache: &RelationshipCache,
    source: &S,
    root: PersonHandle,
    target: PersonHandle,
) -> Result<Option<u32>> {
    let mut stack = vec![(root, 0u32)];
    let mut expanded: HashSet<PersonHandle> = HashSet::new();

    while let Some((person, depth)) = stack.pop() {
        if person == target {
            return Ok(Some(depth));
        }
        if !expanded.insert(person) {
            continue;
        }

        let record = cache.get(source, person).await?;
        if record.children().contains(&target) {
            return Ok(Some(depth + 1));
        }
        for &child in record.children().iter().rev() {
            stack.push((child, depth + 1));
        }
    }

    Ok(None)
}
