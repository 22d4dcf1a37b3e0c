//! In-memory model of a sequence graph as the canvas submits it.
//!
//! A [`SequenceGraph`] is a snapshot of nodes and edges. Positions are
//! presentation-only, and node `data` is an open key/value map — only a
//! handful of keys (`duration`, `subject`, `body`) are interpreted, via the
//! accessors on [`Node`]. The graph itself performs no validation; structural
//! assumptions are enforced by the compiler's walk.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::NodeKind;

/// Canvas coordinates. Presentation-only; carried through persistence so the
/// editor can restore the layout, never interpreted by the compiler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single step in a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique within a sequence.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    /// Open key/value payload attached by the editor.
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Node {
    /// Wait duration in whole hours.
    ///
    /// Reads `data.duration`, accepting a JSON number or a numeric string.
    /// Absent, malformed, zero, or negative values all fall back to 1 hour.
    #[must_use]
    pub fn wait_hours(&self) -> u64 {
        const FALLBACK: u64 = 1;
        let parsed = match self.data.get("duration") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(hours) if hours > 0 => hours as u64,
            _ => FALLBACK,
        }
    }

    /// `data.subject`, or the empty string when absent.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.data
            .get("subject")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// `data.body`, or the empty string when absent.
    #[must_use]
    pub fn body(&self) -> &str {
        self.data.get("body").and_then(Value::as_str).unwrap_or("")
    }
}

/// A directed connection between two nodes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

/// A sequence graph snapshot: ordered nodes and edges.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceGraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl SequenceGraph {
    #[must_use]
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// The entry point: the first node of kind `input`, if any.
    #[must_use]
    pub fn entry(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind.is_input())
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All edges leaving `id`, in edge order.
    pub fn outgoing<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }
}
