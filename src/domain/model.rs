//! Forest holder and the head-aware mutation API

use std::collections::HashSet;
use std::mem;

use generational_arena::Index;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::arena::{TreeArena, TreeIterator};
use crate::domain::entities::{ContainerVariant, Info, LeafVariant, NodeKind, TreeNode};
use crate::domain::error::{TreeError, TreeResult};
use crate::domain::json::NodeJson;
use crate::domain::provider::{set_localized, NodeFactory};
use crate::domain::{invariants, url};

/// Which ids [`TreeModel::node_ids`] collects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdFilter {
    #[default]
    All,
    ContainersOnly,
    /// Leaves whose `type` discriminator equals the given name
    LeafType(&'static str),
}

impl IdFilter {
    fn accepts(&self, node: &TreeNode) -> bool {
        match self {
            Self::All => true,
            Self::ContainersOnly => node.is_container(),
            Self::LeafType(name) => node.is_leaf() && node.type_name() == *name,
        }
    }
}

/// A forest of structure nodes plus the factory that builds them from JSON.
///
/// The model owns the forest head (first root). Every structural mutation
/// that may change which root is first goes through here; the arena
/// primitives only maintain heads of child chains.
#[derive(Debug)]
pub struct TreeModel<F> {
    arena: TreeArena,
    head: Option<Index>,
    factory: F,
}

impl<F: NodeFactory> TreeModel<F> {
    pub fn new(factory: F) -> Self {
        Self {
            arena: TreeArena::new(),
            head: None,
            factory,
        }
    }

    /// Build a model from a structure document in one step.
    pub fn from_document(factory: F, document: &Value) -> TreeResult<Self> {
        let mut model = Self::new(factory);
        model.parse(document)?;
        Ok(model)
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    /// First root, `None` for an empty structure.
    pub fn head(&self) -> Option<Index> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub fn node(&self, idx: Index) -> TreeResult<&TreeNode> {
        self.arena.node(idx)
    }

    /// Replace the whole forest with the parsed document.
    ///
    /// The document is an array of node items (or `null`). On error the
    /// model keeps its previous content.
    #[instrument(level = "debug", skip(self, document))]
    pub fn parse(&mut self, document: &Value) -> TreeResult<Option<Index>> {
        let items = NodeJson::from_document(document)?;
        let mut arena = TreeArena::new();
        let mut seen = HashSet::new();
        let head = self.build_chain(&mut arena, &mut seen, &items, None)?;
        debug!(
            "parsed {} nodes with {} provider",
            arena.len(),
            self.factory.name()
        );
        self.arena = arena;
        self.head = head;
        Ok(head)
    }

    /// Parse a JSON string, see [`TreeModel::parse`].
    pub fn parse_str(&mut self, json: &str) -> TreeResult<Option<Index>> {
        let document: Value = serde_json::from_str(json)?;
        self.parse(&document)
    }

    fn build_chain(
        &self,
        arena: &mut TreeArena,
        seen: &mut HashSet<String>,
        items: &[NodeJson],
        parent: Option<Index>,
    ) -> TreeResult<Option<Index>> {
        let mut first = None;
        let mut last = None;
        for item in items {
            if !seen.insert(item.id.clone()) {
                return Err(TreeError::DuplicateId(item.id.clone()));
            }
            let node = self.factory.create_node(item)?;
            let is_container = node.is_container();
            let idx = arena.insert(node);

            match (parent, last) {
                (Some(parent), _) => arena.add_child(parent, idx)?,
                (None, Some(last)) => arena.insert_next_to(idx, last)?,
                (None, None) => {}
            }
            first.get_or_insert(idx);
            last = Some(idx);

            if is_container {
                self.build_chain(arena, seen, item.children(), Some(idx))?;
            }
        }
        Ok(first)
    }

    /// Root-level nodes in order.
    pub fn all(&self) -> Vec<Index> {
        self.head
            .and_then(|head| self.arena.all(head).ok())
            .unwrap_or_default()
    }

    /// Pre-order traversal over the whole forest.
    pub fn iter(&self) -> TreeIterator<'_> {
        self.arena.iter_from(self.head)
    }

    /// Ids in pre-order, e.g. to decide which nodes start expanded.
    pub fn node_ids(&self, filter: IdFilter) -> Vec<String> {
        self.iter()
            .filter(|(_, node)| filter.accepts(node))
            .map(|(_, node)| node.id.clone())
            .collect()
    }

    pub fn find(&self, id: &str) -> Option<Index> {
        self.head.and_then(|head| self.arena.find(head, id))
    }

    /// Like [`TreeModel::find`], failing with `UnknownId`.
    pub fn lookup(&self, id: &str) -> TreeResult<Index> {
        self.find(id).ok_or_else(|| TreeError::UnknownId(id.to_string()))
    }

    pub fn children(&self, idx: Index) -> TreeResult<Vec<Index>> {
        self.arena.children(idx)
    }

    pub fn parents(&self, idx: Index) -> TreeResult<Vec<Index>> {
        self.arena.parents(idx)
    }

    /// Nesting level, 0 for roots.
    pub fn depth(&self, idx: Index) -> TreeResult<usize> {
        Ok(self.arena.parents(idx)?.len() - 1)
    }

    /// Closest playbook among the node and its ancestors.
    pub fn test_guide(&self, idx: Index) -> TreeResult<Option<Index>> {
        self.arena
            .ancestor_of_variant(idx, ContainerVariant::Playbook)
    }

    /// Closest report section among the node and its ancestors.
    pub fn report_section(&self, idx: Index) -> TreeResult<Option<Index>> {
        self.arena
            .ancestor_of_variant(idx, ContainerVariant::ReportSection)
    }

    /// Unlink the node and drop its subtree. Returns the number of removed nodes.
    #[instrument(level = "debug", skip(self))]
    pub fn delete_node(&mut self, idx: Index) -> TreeResult<usize> {
        if self.head == Some(idx) {
            let next = self.arena.node(idx)?.next;
            self.arena.delete(idx)?;
            self.head = next;
        } else {
            self.arena.delete(idx)?;
        }
        let removed = self.arena.remove_subtree(idx)?;
        debug!("deleted {} nodes", removed);
        Ok(removed)
    }

    /// Swap with the previous sibling. Returns `false` when already first.
    #[instrument(level = "debug", skip(self))]
    pub fn move_up(&mut self, idx: Index) -> TreeResult<bool> {
        let prev = self.arena.node(idx)?.prev;
        let moved = self.arena.move_up(idx)?;
        if moved.is_some() && prev.is_some() && self.head == prev {
            self.head = moved;
        }
        Ok(moved.is_some())
    }

    /// Swap with the next sibling. Returns `false` when already last.
    #[instrument(level = "debug", skip(self))]
    pub fn move_down(&mut self, idx: Index) -> TreeResult<bool> {
        let replacement = self.arena.move_down(idx)?;
        if replacement.is_some() && self.head == Some(idx) {
            self.head = replacement;
        }
        Ok(replacement.is_some())
    }

    /// Demote a container into its nearest preceding container sibling.
    ///
    /// Returns the new parent. Refused for the first root, for leaves and
    /// when no container precedes the node in its chain.
    #[instrument(level = "debug", skip(self))]
    pub fn make_child(&mut self, idx: Index) -> TreeResult<Index> {
        const OP: &str = "make child";
        let node = self.arena.node(idx)?;
        if self.head == Some(idx) {
            return Err(TreeError::invalid(OP, &node.id, "the first root has no preceding sibling"));
        }
        if !node.is_container() {
            return Err(TreeError::invalid(OP, &node.id, "only containers can be nested"));
        }
        let mut candidate = node.prev;
        while let Some(current) = candidate {
            let sibling = self.arena.node(current)?;
            if sibling.is_container() {
                self.arena.make_child_of(idx, current)?;
                return Ok(current);
            }
            candidate = sibling.prev;
        }
        let id = self.arena.node(idx)?.id.clone();
        Err(TreeError::invalid(OP, &id, "no preceding container sibling"))
    }

    /// Promote a container one level up.
    ///
    /// The node becomes the last container child of its grandparent or, when
    /// its parent is a root, a root placed right after its former parent.
    #[instrument(level = "debug", skip(self))]
    pub fn make_parent(&mut self, idx: Index) -> TreeResult<()> {
        const OP: &str = "make parent";
        let node = self.arena.node(idx)?;
        if !node.is_container() {
            return Err(TreeError::invalid(OP, &node.id, "only containers can be promoted"));
        }
        let Some(parent) = node.parent else {
            return Err(TreeError::invalid(OP, &node.id, "node is already a root"));
        };
        let grandparent = self.arena.node(parent)?.parent;

        self.arena.delete(idx)?;
        match grandparent {
            Some(grandparent) => self.arena.add_child(grandparent, idx),
            None => self.arena.insert_next_to(idx, parent),
        }
    }

    /// Store a new detached node; link it with `add_child`, `insert_next_to`
    /// or `insert_last`.
    pub fn create(&mut self, node: TreeNode) -> TreeResult<Index> {
        if self.arena.nodes().any(|(_, n)| n.id == node.id) {
            return Err(TreeError::DuplicateId(node.id));
        }
        Ok(self.arena.insert(node))
    }

    /// Create a node from a JSON item through the model's factory.
    pub fn create_from(&mut self, item: &NodeJson) -> TreeResult<Index> {
        let node = self.factory.create_node(item)?;
        self.create(node)
    }

    fn ensure_unlinked(&self, op: &'static str, idx: Index) -> TreeResult<()> {
        let node = self.arena.node(idx)?;
        if self.head == Some(idx) || !node.is_detached() {
            return Err(TreeError::invalid(op, &node.id, "node is already linked"));
        }
        Ok(())
    }

    pub fn add_child(&mut self, new_node: Index, parent: Index) -> TreeResult<()> {
        self.ensure_unlinked("add child", new_node)?;
        self.arena.add_child(parent, new_node)
    }

    pub fn insert_next_to(&mut self, new_node: Index, sibling: Index) -> TreeResult<()> {
        self.ensure_unlinked("insert", new_node)?;
        self.arena.insert_next_to(new_node, sibling)
    }

    /// Append a new node as the last root.
    pub fn insert_last(&mut self, new_node: Index) -> TreeResult<()> {
        self.ensure_unlinked("insert", new_node)?;
        match self.head {
            None => {
                self.head = Some(new_node);
                Ok(())
            }
            Some(head) => {
                let last = self.arena.last_sibling(head)?;
                self.arena.insert_next_to(new_node, last)
            }
        }
    }

    /// Set the display name and the `title` it is read from: `info.title` for
    /// containers, the item's own `title` for leaves. A language-keyed title
    /// only changes in the factory's language.
    pub fn rename(&mut self, idx: Index, name: impl Into<String>) -> TreeResult<()> {
        let name = name.into();
        let language = self.factory.language();
        let node = self.arena.node_mut(idx)?;
        let fields = match &mut node.kind {
            NodeKind::Container(c) => &mut c.info,
            NodeKind::Leaf(_) => &mut node.extra,
        };
        set_localized(fields, "title", language, &name);
        node.name = name;
        Ok(())
    }

    /// Replace the business payload of a container.
    pub fn set_info(&mut self, idx: Index, info: Info) -> TreeResult<()> {
        let node = self.arena.node_mut(idx)?;
        let id = node.id.clone();
        match node.as_container_mut() {
            Some(c) => {
                c.info = info;
                Ok(())
            }
            None => Err(TreeError::invalid("set info", &id, "leaves carry no info")),
        }
    }

    /// Replace the business payload of a leaf.
    pub fn set_leaf_variant(&mut self, idx: Index, variant: LeafVariant) -> TreeResult<()> {
        let node = self.arena.node_mut(idx)?;
        let id = node.id.clone();
        match &mut node.kind {
            NodeKind::Leaf(leaf)
                if mem::discriminant(&leaf.variant) == mem::discriminant(&variant) =>
            {
                leaf.variant = variant;
                Ok(())
            }
            _ => Err(TreeError::invalid(
                "set leaf variant",
                &id,
                "node is not a leaf of the same type",
            )),
        }
    }

    /// REST path of the node below `base`.
    pub fn url(&self, idx: Index, base: &str) -> TreeResult<String> {
        url::node_url(&self.arena, idx, base)
    }

    /// Check every link of the forest.
    ///
    /// Nodes stored with [`TreeModel::create`] but never linked count as
    /// unreachable.
    pub fn verify(&self) -> TreeResult<()> {
        invariants::verify(&self.arena, self.head)
    }

    /// Serialize the forest, root by root.
    pub fn to_json(&self) -> TreeResult<Vec<NodeJson>> {
        self.all()
            .into_iter()
            .map(|idx| self.arena.to_json(idx))
            .collect()
    }

    pub fn to_value(&self) -> TreeResult<Value> {
        Ok(serde_json::to_value(self.to_json()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider::GenericProvider;
    use serde_json::json;

    fn model(doc: Value) -> TreeModel<GenericProvider> {
        TreeModel::from_document(GenericProvider::default(), &doc).unwrap()
    }

    fn root_ids<F: NodeFactory>(m: &TreeModel<F>) -> Vec<String> {
        m.all().iter().map(|&i| m.node(i).unwrap().id.clone()).collect()
    }

    fn three_roots() -> TreeModel<GenericProvider> {
        model(json!([
            {"id": "A", "type": "container", "info": {}, "children": []},
            {"id": "B", "type": "container", "info": {}, "children": []},
            {"id": "C", "type": "container", "info": {}, "children": []}
        ]))
    }

    #[test]
    fn given_empty_document_when_parsing_then_head_is_none() {
        let mut m = TreeModel::new(GenericProvider::default());
        assert_eq!(m.parse(&json!([])).unwrap(), None);
        assert_eq!(m.parse(&Value::Null).unwrap(), None);
        assert!(m.all().is_empty());
        assert!(m.to_json().unwrap().is_empty());
    }

    #[test]
    fn given_second_root_when_moving_up_then_head_follows() {
        let mut m = three_roots();
        let b = m.lookup("B").unwrap();
        assert!(m.move_up(b).unwrap());
        assert_eq!(m.head(), Some(b));
        assert_eq!(root_ids(&m), ["B", "A", "C"]);
    }

    #[test]
    fn given_last_root_when_moving_up_then_head_is_unchanged() {
        let mut m = three_roots();
        let head = m.head();
        let c = m.lookup("C").unwrap();
        assert!(m.move_up(c).unwrap());
        assert_eq!(m.head(), head);
        assert_eq!(root_ids(&m), ["A", "C", "B"]);
    }

    #[test]
    fn given_middle_root_when_deleting_then_neighbours_join() {
        let mut m = three_roots();
        let b = m.lookup("B").unwrap();
        assert_eq!(m.delete_node(b).unwrap(), 1);
        assert_eq!(root_ids(&m), ["A", "C"]);
        assert!(matches!(m.node(b), Err(TreeError::StaleHandle)));
    }

    #[test]
    fn given_only_root_when_deleting_then_model_is_empty() {
        let mut m = model(json!([{"id": "A", "type": "container", "info": {}, "children": [
            {"id": "A1", "type": "leaf"}
        ]}]));
        let a = m.lookup("A").unwrap();
        assert_eq!(m.delete_node(a).unwrap(), 2);
        assert!(m.is_empty());
        assert!(m.arena().is_empty());
    }

    #[test]
    fn given_nested_container_when_making_parent_then_becomes_root_after_former_parent() {
        let mut m = model(json!([
            {"id": "A", "type": "container", "info": {}, "children": [
                {"id": "A1", "type": "container", "info": {}, "children": []},
                {"id": "A2", "type": "container", "info": {}, "children": []}
            ]},
            {"id": "B", "type": "container", "info": {}, "children": []}
        ]));
        let a1 = m.lookup("A1").unwrap();
        m.make_parent(a1).unwrap();
        assert_eq!(root_ids(&m), ["A", "A1", "B"]);
        assert_eq!(m.node(a1).unwrap().parent(), None);
        let a = m.lookup("A").unwrap();
        let children: Vec<_> = m
            .children(a)
            .unwrap()
            .iter()
            .map(|&i| m.node(i).unwrap().id.clone())
            .collect();
        assert_eq!(children, ["A2"]);
    }

    #[test]
    fn given_grandchild_when_making_parent_then_appended_to_grandparent() {
        let mut m = model(json!([
            {"id": "A", "type": "container", "info": {}, "children": [
                {"id": "B", "type": "container", "info": {}, "children": [
                    {"id": "C", "type": "container", "info": {}, "children": []}
                ]},
                {"id": "D", "type": "container", "info": {}, "children": []}
            ]}
        ]));
        let c = m.lookup("C").unwrap();
        m.make_parent(c).unwrap();
        let a = m.lookup("A").unwrap();
        assert_eq!(m.node(c).unwrap().parent(), Some(a));
        assert_eq!(m.node_ids(IdFilter::All), ["A", "B", "D", "C"]);
    }

    #[test]
    fn given_root_when_making_parent_then_fails_and_tree_is_unchanged() {
        let mut m = three_roots();
        let before = m.to_value().unwrap();
        let a = m.lookup("A").unwrap();
        assert!(matches!(m.make_parent(a), Err(TreeError::InvalidOperation { .. })));
        assert_eq!(m.to_value().unwrap(), before);
    }

    #[test]
    fn given_head_when_making_child_then_fails() {
        let mut m = three_roots();
        let a = m.lookup("A").unwrap();
        let err = m.make_child(a).unwrap_err();
        assert!(err.to_string().contains("first root"));
    }

    #[test]
    fn given_only_leaves_before_node_when_making_child_then_fails() {
        let mut m = model(json!([
            {"id": "P", "type": "container", "info": {}, "children": [
                {"id": "L1", "type": "leaf"},
                {"id": "L2", "type": "leaf"}
            ]}
        ]));
        let l2 = m.lookup("L2").unwrap();
        assert!(matches!(m.make_child(l2), Err(TreeError::InvalidOperation { .. })));
    }

    #[test]
    fn given_leaf_root_between_containers_when_making_child_then_skips_to_container() {
        let mut m = model(json!([
            {"id": "A", "type": "container", "info": {}, "children": []},
            {"id": "x", "type": "leaf"},
            {"id": "B", "type": "container", "info": {}, "children": []}
        ]));
        let b = m.lookup("B").unwrap();
        let a = m.make_child(b).unwrap();
        assert_eq!(m.node(a).unwrap().id, "A");
        assert_eq!(root_ids(&m), ["A", "x"]);
    }

    #[test]
    fn given_created_nodes_when_inserting_last_then_they_become_roots() {
        let mut m = TreeModel::new(GenericProvider::default());
        let a = m.create_from(&NodeJson::container("A", "container", Info::new(), vec![])).unwrap();
        m.insert_last(a).unwrap();
        let b = m.create_from(&NodeJson::leaf("B", "leaf")).unwrap();
        m.insert_last(b).unwrap();
        assert_eq!(m.head(), Some(a));
        assert_eq!(root_ids(&m), ["A", "B"]);
        assert!(matches!(m.insert_last(a), Err(TreeError::InvalidOperation { .. })));
        assert!(matches!(
            m.create_from(&NodeJson::leaf("B", "leaf")),
            Err(TreeError::DuplicateId(_))
        ));
    }

    #[test]
    fn given_container_when_adding_created_leaf_then_it_joins_leaf_chain() {
        let mut m = three_roots();
        let a = m.lookup("A").unwrap();
        let leaf = m.create(TreeNode::leaf("n", "New", LeafVariant::Item)).unwrap();
        m.add_child(leaf, a).unwrap();
        assert_eq!(m.find("n"), Some(leaf));
        assert_eq!(m.depth(leaf).unwrap(), 1);
        assert_eq!(
            m.node(a).unwrap().as_container().unwrap().first_leaf_child(),
            Some(leaf)
        );
    }

    #[test]
    fn given_ids_filter_when_collecting_then_only_matching_nodes_are_returned() {
        let m = model(json!([
            {"id": "A", "type": "container", "info": {}, "children": [
                {"id": "A1", "type": "leaf"},
                {"id": "AC", "type": "container", "info": {}, "children": []}
            ]},
            {"id": "B", "type": "leaf"}
        ]));
        assert_eq!(m.node_ids(IdFilter::All), ["A", "AC", "A1", "B"]);
        assert_eq!(m.node_ids(IdFilter::ContainersOnly), ["A", "AC"]);
        assert_eq!(m.node_ids(IdFilter::LeafType("leaf")), ["A1", "B"]);
    }

    #[test]
    fn given_duplicate_ids_when_parsing_then_fails_and_keeps_previous_model() {
        let mut m = three_roots();
        let before = m.to_value().unwrap();
        let err = m
            .parse(&json!([
                {"id": "X", "type": "leaf"},
                {"id": "X", "type": "leaf"}
            ]))
            .unwrap_err();
        assert!(matches!(err, TreeError::DuplicateId(id) if id == "X"));
        assert_eq!(m.to_value().unwrap(), before);
    }

    #[test]
    fn given_container_when_setting_info_then_json_reflects_info() {
        let mut m = three_roots();
        let a = m.lookup("A").unwrap();
        let info = json!({"scope": "web"}).as_object().cloned().unwrap();
        m.set_info(a, info).unwrap();
        assert_eq!(m.to_value().unwrap()[0]["info"], json!({"scope": "web"}));
    }

    #[test]
    fn given_nodes_when_renaming_then_title_is_serialized() {
        let mut m = TreeModel::from_document(
            GenericProvider::new("de"),
            &json!([
                {"id": "A", "type": "container", "info": {"title": {"en": "Scope", "de": "Umfang"}}, "children": [
                    {"id": "A1", "type": "leaf"}
                ]}
            ]),
        )
        .unwrap();
        let a = m.lookup("A").unwrap();
        let a1 = m.lookup("A1").unwrap();

        m.rename(a, "Bereich").unwrap();
        m.rename(a1, "Login check").unwrap();

        let value = m.to_value().unwrap();
        assert_eq!(value[0]["info"]["title"], json!({"en": "Scope", "de": "Bereich"}));
        assert_eq!(value[0]["children"][0], json!({"id": "A1", "type": "leaf", "title": "Login check"}));
        let reparsed = TreeModel::from_document(GenericProvider::new("de"), &value).unwrap();
        assert_eq!(reparsed.node(reparsed.lookup("A").unwrap()).unwrap().name, "Bereich");
        assert_eq!(reparsed.node(reparsed.lookup("A1").unwrap()).unwrap().name, "Login check");
    }
}
