//! Domain entities: tree nodes and the business kinds they carry

use std::fmt;

use generational_arena::Index;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form JSON object carried through unchanged: container `info`, item extras.
pub type Info = Map<String, Value>;

/// A node in the structure tree.
///
/// Sibling links (`prev`/`next`) connect nodes of the same chain: the forest
/// roots, or one of the two child chains of a container. Links are arena
/// handles and are only mutated through [`crate::domain::TreeArena`].
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    /// Externally assigned id, unique within the tree
    pub id: String,
    /// Display label
    pub name: String,
    pub(crate) parent: Option<Index>,
    pub(crate) prev: Option<Index>,
    pub(crate) next: Option<Index>,
    /// Item keys other than `id`, `type`, `info` and `children`, written back on output
    pub extra: Info,
    pub kind: NodeKind,
}

impl TreeNode {
    /// Create a detached container node.
    pub fn container(
        id: impl Into<String>,
        name: impl Into<String>,
        variant: ContainerVariant,
        info: Info,
    ) -> Self {
        Self::detached(
            id.into(),
            name.into(),
            NodeKind::Container(ContainerNode {
                first_container_child: None,
                first_leaf_child: None,
                info,
                variant,
            }),
        )
    }

    /// Create a detached leaf node.
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, variant: LeafVariant) -> Self {
        Self::detached(id.into(), name.into(), NodeKind::Leaf(LeafNode { variant }))
    }

    /// Attach the item fields the node does not model itself.
    pub fn with_extra(mut self, extra: Info) -> Self {
        self.extra = extra;
        self
    }

    fn detached(id: String, name: String, kind: NodeKind) -> Self {
        Self {
            id,
            name,
            parent: None,
            prev: None,
            next: None,
            extra: Info::new(),
            kind,
        }
    }

    pub fn parent(&self) -> Option<Index> {
        self.parent
    }

    pub fn prev(&self) -> Option<Index> {
        self.prev
    }

    pub fn next(&self) -> Option<Index> {
        self.next
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    /// True when the node has no parent and no siblings linked to it.
    pub fn is_detached(&self) -> bool {
        self.parent.is_none() && self.prev.is_none() && self.next.is_none()
    }

    pub fn as_container(&self) -> Option<&ContainerNode> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf(_) => None,
        }
    }

    pub(crate) fn as_container_mut(&mut self) -> Option<&mut ContainerNode> {
        match &mut self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match &self.kind {
            NodeKind::Leaf(l) => Some(l),
            NodeKind::Container(_) => None,
        }
    }

    /// The `type` discriminator used in the JSON representation.
    pub fn type_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Container(c) => c.variant.type_name(),
            NodeKind::Leaf(l) => l.variant.type_name(),
        }
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.type_name())
    }
}

/// The two structural shapes a node can take.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Container(ContainerNode),
    Leaf(LeafNode),
}

/// A node owning two child chains: container children first, then leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerNode {
    pub(crate) first_container_child: Option<Index>,
    pub(crate) first_leaf_child: Option<Index>,
    pub info: Info,
    pub variant: ContainerVariant,
}

impl ContainerNode {
    pub fn first_container_child(&self) -> Option<Index> {
        self.first_container_child
    }

    pub fn first_leaf_child(&self) -> Option<Index> {
        self.first_leaf_child
    }

    pub(crate) fn chain_head(&self, container_chain: bool) -> Option<Index> {
        if container_chain {
            self.first_container_child
        } else {
            self.first_leaf_child
        }
    }

    pub(crate) fn chain_head_mut(&mut self, container_chain: bool) -> &mut Option<Index> {
        if container_chain {
            &mut self.first_container_child
        } else {
            &mut self.first_leaf_child
        }
    }
}

/// Business kinds of container nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerVariant {
    /// Untyped container of the generic structure
    Section,
    ReportSection,
    /// A test guide
    Playbook,
    /// Section grouping procedures inside a playbook
    ProcedureSection,
    /// Section of a test-guide template
    TemplateProcedureSection,
}

impl ContainerVariant {
    pub fn type_name(self) -> &'static str {
        match self {
            Self::ReportSection => "reportSection",
            Self::Playbook => "playbook",
            Self::Section | Self::ProcedureSection | Self::TemplateProcedureSection => "container",
        }
    }
}

/// A node without children.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub variant: LeafVariant,
}

/// Business kinds of leaf nodes.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafVariant {
    /// Untyped leaf of the generic structure
    Item,
    Procedure(Procedure),
    Vulnerability(Vulnerability),
    TemplateProcedure(TemplateProcedure),
}

impl LeafVariant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Item => "leaf",
            Self::Procedure(_) | Self::TemplateProcedure(_) => "procedure",
            Self::Vulnerability(_) => "vulnerability",
        }
    }

    /// Write the typed fields into `fields`.
    ///
    /// A field at its default value is skipped unless `fields` already holds
    /// a non-null value for it, so untouched items keep their exact shape.
    pub fn write_fields(&self, fields: &mut Info) -> serde_json::Result<()> {
        match self {
            Self::Item => {}
            Self::Procedure(p) => {
                put(fields, "status", &p.status, p.status == TestingStatus::default())?;
                put(fields, "priority", &p.priority, p.priority == Priority::default())?;
                put(fields, "template", &p.template, p.template.is_none())?;
            }
            Self::Vulnerability(v) => {
                put(fields, "severity", &v.severity, v.severity == Severity::default())?;
                put(fields, "status", &v.status, v.status == VulnerabilityStatus::default())?;
                put(fields, "hasEvidence", &v.artifacts.evidence, !v.artifacts.evidence)?;
                put(fields, "hasRequests", &v.artifacts.requests, !v.artifacts.requests)?;
                put(fields, "hasScreenshots", &v.artifacts.screenshots, !v.artifacts.screenshots)?;
            }
            Self::TemplateProcedure(t) => {
                put(fields, "template", &t.template, t.template.is_none())?;
            }
        }
        Ok(())
    }
}

fn put<T: Serialize>(
    fields: &mut Info,
    key: &str,
    value: &T,
    is_default: bool,
) -> serde_json::Result<()> {
    if is_default && fields.get(key).map_or(true, Value::is_null) {
        return Ok(());
    }
    fields.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(())
}

/// A test procedure inside a playbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Procedure {
    pub status: TestingStatus,
    pub priority: Priority,
    /// Id of the template procedure this one was instantiated from
    pub template: Option<String>,
}

/// A test procedure inside a test-guide template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateProcedure {
    pub template: Option<String>,
}

/// A finding attached to a report section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vulnerability {
    pub severity: Severity,
    pub status: VulnerabilityStatus,
    pub artifacts: ArtifactFlags,
}

/// Which artifacts a vulnerability has attached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArtifactFlags {
    pub evidence: bool,
    pub requests: bool,
    pub screenshots: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestingStatus {
    #[default]
    Open,
    InProgress,
    Passed,
    Failed,
    NotApplicable,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityStatus {
    #[default]
    Open,
    Resolved,
    Accepted,
    FalsePositive,
}
