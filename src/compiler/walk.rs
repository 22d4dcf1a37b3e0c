//! Linear path traversal over a sequence graph.

use rustc_hash::FxHashSet;

use super::CompileError;
use crate::graph::{Node, SequenceGraph};

/// A cursor that walks the single path leading out of a graph's entry node.
///
/// `PathWalk` isolates the linear-chain assumption: each call to
/// [`advance`](Self::advance) resolves the current node's outgoing edge and
/// steps to its target. The walk terminates (yields `None`) when:
///
/// - the graph has no entry node,
/// - the current node has no outgoing edge,
/// - the edge points at a node that does not exist, or
/// - the target was already visited (an edge cycle).
///
/// A node with more than one outgoing edge is a structural error, not a
/// termination.
pub struct PathWalk<'a> {
    graph: &'a SequenceGraph,
    cursor: Option<&'a Node>,
    visited: FxHashSet<&'a str>,
}

impl<'a> PathWalk<'a> {
    /// Start a walk at the graph's entry node.
    #[must_use]
    pub fn from_entry(graph: &'a SequenceGraph) -> Self {
        let cursor = graph.entry();
        let mut visited = FxHashSet::default();
        if let Some(entry) = cursor {
            visited.insert(entry.id.as_str());
        }
        Self {
            graph,
            cursor,
            visited,
        }
    }

    /// Step to the next node on the path, or `None` when the walk is over.
    ///
    /// # Errors
    ///
    /// [`CompileError::MultipleOutgoingEdges`] when the current node has more
    /// than one outgoing edge.
    pub fn advance(&mut self) -> Result<Option<&'a Node>, CompileError> {
        let Some(current) = self.cursor else {
            return Ok(None);
        };

        let mut outgoing = self.graph.outgoing(&current.id);
        let Some(edge) = outgoing.next() else {
            self.cursor = None;
            return Ok(None);
        };
        if outgoing.next().is_some() {
            self.cursor = None;
            return Err(CompileError::MultipleOutgoingEdges {
                node_id: current.id.clone(),
            });
        }

        // Dangling edge target: degrade to termination.
        let Some(next) = self.graph.node(&edge.target) else {
            self.cursor = None;
            return Ok(None);
        };

        // Cycle guard: never revisit a node.
        if !self.visited.insert(next.id.as_str()) {
            self.cursor = None;
            return Ok(None);
        }

        self.cursor = Some(next);
        Ok(Some(next))
    }
}
