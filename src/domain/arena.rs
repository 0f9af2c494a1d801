use std::iter;

use generational_arena::{Arena, Index};
use tracing::instrument;

use crate::domain::entities::{ContainerVariant, NodeKind, TreeNode};
use crate::domain::error::{TreeError, TreeResult};
use crate::domain::json::NodeJson;

/// Arena-backed storage for structure nodes.
///
/// Nodes reference each other through generational handles, so a handle to a
/// deleted node can never alias a node inserted later. The primitives here
/// maintain sibling links, parent links and the two child-chain heads of
/// containers. They never know which node is the first forest root; that is
/// the job of [`crate::domain::TreeModel`].
#[derive(Debug, Default)]
pub struct TreeArena {
    arena: Arena<TreeNode>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    /// Store a node without linking it anywhere.
    #[instrument(level = "trace", skip(self, node), fields(id = %node.id))]
    pub fn insert(&mut self, node: TreeNode) -> Index {
        self.arena.insert(node)
    }

    pub fn get(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn get_mut(&mut self, idx: Index) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Every stored node, linked or not, in storage order.
    pub fn nodes(&self) -> impl Iterator<Item = (Index, &TreeNode)> {
        self.arena.iter()
    }

    pub(crate) fn node(&self, idx: Index) -> TreeResult<&TreeNode> {
        self.arena.get(idx).ok_or(TreeError::StaleHandle)
    }

    pub(crate) fn node_mut(&mut self, idx: Index) -> TreeResult<&mut TreeNode> {
        self.arena.get_mut(idx).ok_or(TreeError::StaleHandle)
    }

    /// Nodes of the chain starting at `head`, following `next`.
    fn chain_from(&self, head: Option<Index>) -> impl Iterator<Item = Index> + '_ {
        iter::successors(head, move |&idx| self.arena.get(idx).and_then(|n| n.next))
    }

    /// Container children in chain order, followed by leaf children in chain order.
    #[instrument(level = "trace", skip(self))]
    pub fn children(&self, idx: Index) -> TreeResult<Vec<Index>> {
        match self.node(idx)?.as_container() {
            None => Ok(Vec::new()),
            Some(c) => Ok(self
                .chain_from(c.first_container_child)
                .chain(self.chain_from(c.first_leaf_child))
                .collect()),
        }
    }

    /// The node itself followed by every later sibling of its chain.
    #[instrument(level = "trace", skip(self))]
    pub fn all(&self, idx: Index) -> TreeResult<Vec<Index>> {
        self.node(idx)?;
        Ok(self.chain_from(Some(idx)).collect())
    }

    /// Later siblings of the node's chain.
    pub fn siblings(&self, idx: Index) -> TreeResult<Vec<Index>> {
        Ok(self.all(idx)?.into_iter().skip(1).collect())
    }

    /// `[idx, parent, grandparent, ...]` up to the forest root.
    #[instrument(level = "trace", skip(self))]
    pub fn parents(&self, idx: Index) -> TreeResult<Vec<Index>> {
        self.node(idx)?;
        Ok(iter::successors(Some(idx), |&i| self.arena.get(i).and_then(|n| n.parent)).collect())
    }

    pub fn last_sibling(&self, idx: Index) -> TreeResult<Index> {
        self.node(idx)?;
        Ok(self.chain_from(Some(idx)).last().unwrap_or(idx))
    }

    /// Closest node in `[idx, parent, ...]` that is a container of the given variant.
    pub fn ancestor_of_variant(
        &self,
        idx: Index,
        variant: ContainerVariant,
    ) -> TreeResult<Option<Index>> {
        Ok(self.parents(idx)?.into_iter().find(|&i| {
            self.arena
                .get(i)
                .and_then(TreeNode::as_container)
                .is_some_and(|c| c.variant == variant)
        }))
    }

    fn link(&mut self, left: Option<Index>, right: Option<Index>) {
        if let Some(node) = left.and_then(|l| self.arena.get_mut(l)) {
            node.next = right;
        }
        if let Some(node) = right.and_then(|r| self.arena.get_mut(r)) {
            node.prev = left;
        }
    }

    fn set_chain_head(
        &mut self,
        parent: Index,
        container_chain: bool,
        head: Option<Index>,
    ) -> TreeResult<()> {
        let node = self.node_mut(parent)?;
        let id = node.id.clone();
        match node.as_container_mut() {
            Some(c) => {
                *c.chain_head_mut(container_chain) = head;
                Ok(())
            }
            None => Err(TreeError::Corrupt(format!("leaf {id} is used as a parent"))),
        }
    }

    fn is_ancestor_or_self(&self, candidate: Index, of: Index) -> TreeResult<bool> {
        Ok(self.parents(of)?.contains(&candidate))
    }

    /// Splice a detached node right after `target`, adopting its parent.
    ///
    /// Never changes a chain head, so it can only append after an existing node.
    #[instrument(level = "trace", skip(self))]
    pub fn insert_next_to(&mut self, idx: Index, target: Index) -> TreeResult<()> {
        const OP: &str = "insert";
        let node = self.node(idx)?;
        if !node.is_detached() {
            return Err(TreeError::invalid(OP, &node.id, "node is still linked"));
        }
        let is_container = node.is_container();
        let id = node.id.clone();
        if self.is_ancestor_or_self(idx, target)? {
            return Err(TreeError::invalid(OP, &id, "target lies inside the node"));
        }
        let target_node = self.node(target)?;
        let (parent, after) = (target_node.parent, target_node.next);
        if parent.is_some() && target_node.is_container() != is_container {
            return Err(TreeError::invalid(
                OP,
                &id,
                "child chains hold either containers or leaves",
            ));
        }

        self.link(Some(idx), after);
        self.link(Some(target), Some(idx));
        self.node_mut(idx)?.parent = parent;
        Ok(())
    }

    /// Swap the node with its predecessor.
    ///
    /// Returns `None` when the node is already first. When the node becomes
    /// first of a child chain the parent's head is updated; the forest-root
    /// head is left to the caller.
    #[instrument(level = "trace", skip(self))]
    pub fn move_up(&mut self, idx: Index) -> TreeResult<Option<Index>> {
        let node = self.node(idx)?;
        let Some(prev) = node.prev else {
            return Ok(None);
        };
        let (next, parent, is_container) = (node.next, node.parent, node.is_container());
        let prev_prev = self.node(prev)?.prev;

        self.link(prev_prev, Some(idx));
        self.link(Some(idx), Some(prev));
        self.link(Some(prev), next);

        if prev_prev.is_none() {
            if let Some(parent) = parent {
                self.set_chain_head(parent, is_container, Some(idx))?;
            }
        }
        Ok(Some(idx))
    }

    /// Swap the node with its successor.
    ///
    /// Returns the node now occupying the old slot, or `None` when the node is
    /// already last.
    #[instrument(level = "trace", skip(self))]
    pub fn move_down(&mut self, idx: Index) -> TreeResult<Option<Index>> {
        let Some(next) = self.node(idx)?.next else {
            return Ok(None);
        };
        self.move_up(next)?;
        Ok(Some(next))
    }

    /// Append a detached node to the matching child chain of `parent`.
    #[instrument(level = "trace", skip(self))]
    pub fn add_child(&mut self, parent: Index, child: Index) -> TreeResult<()> {
        const OP: &str = "add child";
        let child_node = self.node(child)?;
        let id = child_node.id.clone();
        if !child_node.is_detached() {
            return Err(TreeError::invalid(OP, &id, "node is still linked"));
        }
        let is_container = child_node.is_container();
        if self.is_ancestor_or_self(child, parent)? {
            return Err(TreeError::invalid(OP, &id, "a node cannot contain itself"));
        }
        let head = self
            .node(parent)?
            .as_container()
            .ok_or_else(|| TreeError::invalid(OP, &id, "leaves cannot own children"))?
            .chain_head(is_container);

        match head {
            None => self.set_chain_head(parent, is_container, Some(child))?,
            Some(head) => {
                let last = self.last_sibling(head)?;
                self.link(Some(last), Some(child));
            }
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Move a container under another container, as its last container child.
    #[instrument(level = "trace", skip(self))]
    pub fn make_child_of(&mut self, idx: Index, new_parent: Index) -> TreeResult<()> {
        const OP: &str = "make child";
        let node = self.node(idx)?;
        let id = node.id.clone();
        if !node.is_container() || !self.node(new_parent)?.is_container() {
            return Err(TreeError::invalid(
                OP,
                &id,
                "only containers can be nested under containers",
            ));
        }
        if self.is_ancestor_or_self(idx, new_parent)? {
            return Err(TreeError::invalid(OP, &id, "target lies inside the node"));
        }
        self.delete(idx)?;
        self.add_child(new_parent, idx)
    }

    /// Unlink the node from its chain and clear its links.
    ///
    /// Fixes the parent's chain head when the node was first. Children stay
    /// attached to the node.
    #[instrument(level = "trace", skip(self))]
    pub fn delete(&mut self, idx: Index) -> TreeResult<Index> {
        let node = self.node(idx)?;
        let (prev, next, parent, is_container) =
            (node.prev, node.next, node.parent, node.is_container());

        match prev {
            Some(prev) => self.link(Some(prev), next),
            None => {
                self.link(None, next);
                if let Some(parent) = parent {
                    self.set_chain_head(parent, is_container, next)?;
                }
            }
        }

        let node = self.node_mut(idx)?;
        node.prev = None;
        node.next = None;
        node.parent = None;
        Ok(idx)
    }

    /// Drop a detached node and everything below it from storage.
    #[instrument(level = "trace", skip(self))]
    pub fn remove_subtree(&mut self, idx: Index) -> TreeResult<usize> {
        let mut stack = vec![idx];
        let mut removed = 0;
        while let Some(current) = stack.pop() {
            stack.extend(self.children(current)?);
            if self.arena.remove(current).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Depth-first search through children, then later siblings.
    ///
    /// Earlier siblings of `from` are not searched.
    #[instrument(level = "trace", skip(self))]
    pub fn find(&self, from: Index, id: &str) -> Option<Index> {
        for current in self.chain_from(Some(from)) {
            let node = self.arena.get(current)?;
            if node.id == id {
                return Some(current);
            }
            if let Some(c) = node.as_container() {
                let found = [c.first_container_child, c.first_leaf_child]
                    .into_iter()
                    .flatten()
                    .find_map(|head| self.find(head, id));
                if found.is_some() {
                    return found;
                }
            }
        }
        None
    }

    /// Serialize the node and its subtree.
    ///
    /// Leaves get their typed fields written over the carried extras.
    pub fn to_json(&self, idx: Index) -> TreeResult<NodeJson> {
        let node = self.node(idx)?;
        let mut item = match &node.kind {
            NodeKind::Leaf(_) => NodeJson::leaf(&node.id, node.type_name()),
            NodeKind::Container(c) => {
                let children = self
                    .children(idx)?
                    .into_iter()
                    .map(|child| self.to_json(child))
                    .collect::<TreeResult<Vec<_>>>()?;
                NodeJson::container(&node.id, node.type_name(), c.info.clone(), children)
            }
        };
        item.extra = node.extra.clone();
        if let NodeKind::Leaf(leaf) = &node.kind {
            leaf.variant.write_fields(&mut item.extra)?;
        }
        Ok(item)
    }

    /// Pre-order traversal of the chain starting at `head` and all subtrees.
    pub fn iter_from(&self, head: Option<Index>) -> TreeIterator<'_> {
        TreeIterator::new(self, head)
    }
}

/// Pre-order iterator: a node, its container children, its leaf children,
/// then its later siblings.
pub struct TreeIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(arena: &'a TreeArena, head: Option<Index>) -> Self {
        Self {
            arena,
            stack: head.into_iter().collect(),
        }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let node = self.arena.get(current)?;
        // Pushed in reverse visiting order
        self.stack.extend(node.next);
        if let Some(c) = node.as_container() {
            self.stack.extend(c.first_leaf_child);
            self.stack.extend(c.first_container_child);
        }
        Some((current, node))
    }
}
