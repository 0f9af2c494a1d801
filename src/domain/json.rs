//! Wire shape of a structure node

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::error::{TreeError, TreeResult};

/// One node of the nested JSON structure exchanged with the backend.
///
/// Containers serialize as `{id, type, info, children}`, leaves as `{id, type}`,
/// both followed by the keys in `extra` (`status`, `priority`, `title`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeJson>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeJson {
    pub fn container(
        id: impl Into<String>,
        node_type: impl Into<String>,
        info: Map<String, Value>,
        children: Vec<NodeJson>,
    ) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            info: Some(info),
            children: Some(children),
            extra: Map::new(),
        }
    }

    pub fn leaf(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            info: None,
            children: None,
            extra: Map::new(),
        }
    }

    /// Children of the item, empty when the key is absent.
    pub fn children(&self) -> &[NodeJson] {
        self.children.as_deref().unwrap_or_default()
    }

    /// Decode a structure document: an array of nodes, or `null` for an empty one.
    pub fn from_document(value: &Value) -> TreeResult<Vec<NodeJson>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    NodeJson::deserialize(item)
                        .map_err(|e| TreeError::malformed(format!("item {i}: {e}")))
                })
                .collect(),
            other => Err(TreeError::malformed(format!(
                "expected an array of nodes, got {}",
                kind_of(other)
            ))),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
