use crate::foundation::error::{TilecompError, TilecompResult};
use std::path::Path;

/// JSON description of a node graph: typed nodes plus links between them.
///
/// ```json
/// {
///   "nodes": [
///     { "id": "a", "type": "value", "params": { "value": 2.0 } },
///     { "id": "out", "type": "composite" }
///   ],
///   "links": [{ "from": "a", "to": "out", "socket": 0 }]
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeGraphDesc {
    /// Nodes, in declaration order.
    pub nodes: Vec<NodeDesc>,
    /// Links from a node's output to a socket of another node.
    #[serde(default)]
    pub links: Vec<LinkDesc>,
}

/// One node.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDesc {
    /// Unique node id.
    pub id: String,
    /// Registered node type, e.g. `"blur"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Type-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// One link.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkDesc {
    /// Producing node id.
    pub from: String,
    /// Consuming node id.
    pub to: String,
    /// Socket index on the consumer.
    #[serde(default)]
    pub socket: usize,
}

impl NodeGraphDesc {
    /// Parse a description from JSON text.
    pub fn from_json_str(s: &str) -> TilecompResult<Self> {
        serde_json::from_str(s).map_err(|e| TilecompError::serde(format!("node graph json: {e}")))
    }

    /// Read and parse a description file.
    pub fn from_path(path: impl AsRef<Path>) -> TilecompResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TilecompError::validation(format!("read node graph '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Pretty-printed JSON.
    pub fn to_json_pretty(&self) -> TilecompResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TilecompError::serde(e.to_string()))
    }
}
