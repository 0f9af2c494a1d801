//! Structural consistency checks over a whole model

use std::collections::HashSet;

use generational_arena::Index;

use crate::domain::arena::TreeArena;
use crate::domain::error::{TreeError, TreeResult};

/// Verify every link of the forest starting at `head`.
///
/// Checks that sibling links are symmetric, that siblings share their parent,
/// that child chains start at their container and hold a single node kind,
/// that nothing is reachable twice and that every stored node is reachable.
pub fn verify(arena: &TreeArena, head: Option<Index>) -> TreeResult<()> {
    let mut visited = HashSet::new();
    if let Some(head) = head {
        let node = arena.node(head)?;
        if node.prev.is_some() || node.parent.is_some() {
            return Err(corrupt(&node.id, "forest head has a predecessor or parent"));
        }
        check_chain(arena, head, None, None, &mut visited)?;
    }
    if visited.len() != arena.len() {
        return Err(TreeError::Corrupt(format!(
            "{} of {} nodes are unreachable",
            arena.len() - visited.len(),
            arena.len()
        )));
    }
    Ok(())
}

fn corrupt(id: &str, what: &str) -> TreeError {
    TreeError::Corrupt(format!("{id}: {what}"))
}

/// Walk one chain; `kind` is `Some(is_container)` for child chains.
fn check_chain(
    arena: &TreeArena,
    head: Index,
    parent: Option<Index>,
    kind: Option<bool>,
    visited: &mut HashSet<Index>,
) -> TreeResult<()> {
    let mut expected_prev = None;
    let mut current = Some(head);
    while let Some(idx) = current {
        let node = arena
            .get(idx)
            .ok_or_else(|| TreeError::Corrupt("link to a removed node".to_string()))?;
        if !visited.insert(idx) {
            return Err(corrupt(&node.id, "reachable more than once"));
        }
        if node.prev != expected_prev {
            return Err(corrupt(&node.id, "prev does not point at the preceding sibling"));
        }
        if node.parent != parent {
            return Err(corrupt(&node.id, "parent differs from its chain owner"));
        }
        if kind.is_some_and(|is_container| is_container != node.is_container()) {
            return Err(corrupt(&node.id, "child chain mixes containers and leaves"));
        }
        if let Some(c) = node.as_container() {
            if let Some(first) = c.first_container_child {
                check_chain(arena, first, Some(idx), Some(true), visited)?;
            }
            if let Some(first) = c.first_leaf_child {
                check_chain(arena, first, Some(idx), Some(false), visited)?;
            }
        }
        expected_prev = Some(idx);
        current = node.next;
    }
    Ok(())
}
