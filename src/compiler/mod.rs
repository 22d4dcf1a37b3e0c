//! Sequence compilation: turning a graph snapshot into scheduled send jobs.
//!
//! [`compile`] walks a [`SequenceGraph`](crate::graph::SequenceGraph) from its
//! entry node and converts every cold-email step into a [`SendJob`] with an
//! absolute fire time. Wait steps accumulate delay; every other node kind is
//! inert. The traversal itself lives in [`PathWalk`], which encodes the
//! linear-chain assumption (at most one outgoing edge per node, no revisits)
//! so it can later be swapped for a real branch-aware walk.
//!
//! Compilation is a pure computation: it produces job descriptors and nothing
//! else. Submitting them to a scheduler is the caller's responsibility.
//!
//! # Examples
//!
//! ```rust
//! use chrono::Utc;
//! use coldflow::compiler::{CompileOptions, compile};
//! use coldflow::graph::SequenceGraph;
//!
//! let graph: SequenceGraph = serde_json::from_value(serde_json::json!({
//!     "nodes": [
//!         {"id": "start", "type": "input"},
//!         {"id": "w", "type": "wait", "data": {"duration": 2}},
//!         {"id": "a", "type": "coldEmail", "data": {"subject": "Hi", "body": "..."}}
//!     ],
//!     "edges": [
//!         {"id": "e1", "source": "start", "target": "w"},
//!         {"id": "e2", "source": "w", "target": "a"}
//!     ]
//! })).unwrap();
//!
//! let jobs = compile(&graph, "seq-1", Utc::now(), &CompileOptions::default()).unwrap();
//! assert_eq!(jobs.len(), 1);
//! ```

mod walk;


pub use walk::PathWalk;

use chrono::{DateTime, Duration, Utc};
use miette::Diagnostic;
use thiserror::Error;

use crate::graph::SequenceGraph;
use crate::mailer::{SEND_EMAIL_KIND, SendPayload};
use crate::types::NodeKind;

/// Errors raised while compiling a sequence graph.
///
/// Malformed graphs generally degrade to partial or empty output instead of
/// erroring; the one structural defect that is rejected outright is a node
/// with more than one outgoing edge, because silently picking one would make
/// the schedule depend on incidental edge order.
#[derive(Debug, Error, Diagnostic)]
pub enum CompileError {
    /// A node on the walked path has more than one outgoing edge.
    #[error("node {node_id} has more than one outgoing edge")]
    #[diagnostic(
        code(coldflow::compiler::multiple_outgoing_edges),
        help("Sequences are linear chains; remove the extra edge before publishing.")
    )]
    MultipleOutgoingEdges { node_id: String },
}

/// How accumulated delay behaves across emitted emails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DelayMode {
    /// Delays accumulate from the traversal start and never reset, so each
    /// email's offset is measured from the moment the sequence was published.
    /// This is the historical behavior of the system this crate replaces.
    #[default]
    FromStart,

    /// The accumulator resets after each emitted email, so only the waits
    /// encountered since the previous email count toward an email's offset —
    /// still measured from compile time. Note that this can schedule a later
    /// email before an earlier one (e.g. 4h → A, 1h → B puts B at +1h and A
    /// at +4h).
    SinceLastEmail,
}

/// Compiler configuration.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompileOptions {
    pub delay_mode: DelayMode,
}

/// A time-delayed send instruction produced by [`compile`].
///
/// Fire-and-forget: once submitted to a scheduler the compiler keeps no
/// record of job identity.
#[derive(Clone, Debug, PartialEq)]
pub struct SendJob {
    /// Absolute timestamp at which the job becomes eligible for execution.
    pub fire_at: DateTime<Utc>,
    /// Job kind at the scheduler boundary; always [`SEND_EMAIL_KIND`] today.
    pub kind: String,
    pub payload: SendPayload,
}

/// Compile a sequence graph into an ordered list of send jobs.
///
/// The walk starts at the unique `input` node. A graph with no entry node,
/// or an entry node with no outgoing edge, compiles to an empty list — a
/// silent no-op rather than an error. Wait nodes add `wait_hours()` to the
/// running delay; cold-email nodes emit a job at `now + accumulated`; the
/// behavior of the accumulator across emails is controlled by
/// [`CompileOptions::delay_mode`].
///
/// # Errors
///
/// Returns [`CompileError::MultipleOutgoingEdges`] when a walked node has
/// more than one outgoing edge.
pub fn compile(
    graph: &SequenceGraph,
    sequence_id: &str,
    now: DateTime<Utc>,
    options: &CompileOptions,
) -> Result<Vec<SendJob>, CompileError> {
    let mut jobs = Vec::new();
    let mut accumulated = Duration::zero();
    let mut walk = PathWalk::from_entry(graph);

    while let Some(node) = walk.advance()? {
        match &node.kind {
            NodeKind::Wait => {
                accumulated += Duration::hours(node.wait_hours() as i64);
            }
            NodeKind::ColdEmail => {
                jobs.push(SendJob {
                    fire_at: now + accumulated,
                    kind: SEND_EMAIL_KIND.to_string(),
                    payload: SendPayload {
                        sequence_id: Some(sequence_id.to_string()),
                        node_id: Some(node.id.clone()),
                        subject: Some(node.subject().to_string()),
                        body: Some(node.body().to_string()),
                        ..SendPayload::default()
                    },
                });
                if options.delay_mode == DelayMode::SinceLastEmail {
                    accumulated = Duration::zero();
                }
            }
            // Entry, lead sources, and unknown kinds neither delay nor emit.
            _ => {}
        }
    }

    Ok(jobs)
}
