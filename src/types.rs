//! Core types for the coldflow sequence model.
//!
//! This module defines the node-kind vocabulary shared by the graph model,
//! the compiler, and the persistence layer. Kinds travel over the wire as the
//! canvas labels (`"input"`, `"leadSource"`, `"wait"`, `"coldEmail"`), so the
//! serde representation is a plain string rather than a tagged enum.
//!
//! # Examples
//!
//! ```rust
//! use coldflow::types::NodeKind;
//!
//! let wait = NodeKind::from("wait");
//! assert!(wait.is_wait());
//!
//! // Unknown labels round-trip through Other
//! let custom = NodeKind::from("abTest");
//! assert_eq!(custom.label(), "abTest");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Identifies the type of a node within a sequence graph.
///
/// The four well-known kinds mirror the steps a sequence is built from:
/// the entry point, a lead source, a wait, and a cold email. Any other label
/// coming off the canvas is preserved verbatim in [`Other`](Self::Other) so
/// that graphs containing unrecognized steps still deserialize; the compiler
/// treats such nodes as inert.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Entry point node that begins the sequence traversal.
    ///
    /// Exactly one is expected per graph; it carries no data consumed by the
    /// compiler and only anchors the walk.
    Input,

    /// Lead-source node. Its `data.type` label is informational only.
    LeadSource,

    /// Wait node carrying `data.duration` in whole hours.
    Wait,

    /// Cold-email node carrying `data.subject` and `data.body`.
    ColdEmail,

    /// Any node label this crate does not interpret.
    Other(String),
}

impl NodeKind {
    /// The wire label for this kind, exactly as the canvas emits it.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            NodeKind::Input => "input",
            NodeKind::LeadSource => "leadSource",
            NodeKind::Wait => "wait",
            NodeKind::ColdEmail => "coldEmail",
            NodeKind::Other(s) => s,
        }
    }

    /// Returns `true` if this is the sequence entry point.
    #[must_use]
    pub fn is_input(&self) -> bool {
        matches!(self, Self::Input)
    }

    /// Returns `true` if this is a wait node.
    #[must_use]
    pub fn is_wait(&self) -> bool {
        matches!(self, Self::Wait)
    }

    /// Returns `true` if this is a cold-email node.
    #[must_use]
    pub fn is_cold_email(&self) -> bool {
        matches!(self, Self::ColdEmail)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<&str> for NodeKind {
    fn from(s: &str) -> Self {
        match s {
            "input" => NodeKind::Input,
            "leadSource" => NodeKind::LeadSource,
            "wait" => NodeKind::Wait,
            "coldEmail" => NodeKind::ColdEmail,
            other => NodeKind::Other(other.to_string()),
        }
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for NodeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(NodeKind::from(label.as_str()))
    }
}
