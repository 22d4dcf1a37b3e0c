//! # Coldflow: Email-Sequence Scheduling Backend
//!
//! Coldflow turns visually composed outbound email sequences — a lead source,
//! waits, and cold emails connected by edges — into durable, time-delayed
//! send jobs, and dispatches them when they come due.
//!
//! ## Core Concepts
//!
//! - **Graph**: a snapshot of the canvas — nodes and edges, linear by design
//! - **Compiler**: a pure walk converting a graph into absolute-time send jobs
//! - **Scheduler**: durable delayed-job queue polled on a fixed interval,
//!   with at-least-once delivery
//! - **Mailer**: the transport seam and the `"send email"` job handler
//! - **Store**: CRUD persistence for named sequence documents
//! - **Server**: the JSON HTTP surface tying the pieces together
//!
//! ## Compiling a Sequence
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use coldflow::compiler::{CompileOptions, compile};
//! use coldflow::graph::SequenceGraph;
//!
//! let graph: SequenceGraph = serde_json::from_value(serde_json::json!({
//!     "nodes": [
//!         {"id": "start", "type": "input"},
//!         {"id": "w1", "type": "wait", "data": {"duration": 2}},
//!         {"id": "a", "type": "coldEmail", "data": {"subject": "Intro", "body": "Hi!"}}
//!     ],
//!     "edges": [
//!         {"id": "e1", "source": "start", "target": "w1"},
//!         {"id": "e2", "source": "w1", "target": "a"}
//!     ]
//! })).unwrap();
//!
//! let now = Utc::now();
//! let jobs = compile(&graph, "seq-1", now, &CompileOptions::default()).unwrap();
//! assert_eq!(jobs[0].fire_at, now + Duration::hours(2));
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Node-kind vocabulary
//! - [`graph`] - Sequence graph model and data accessors
//! - [`compiler`] - Graph-to-jobs compilation and the path walk
//! - [`scheduler`] - Durable job scheduling and the polling loop
//! - [`mailer`] - Mail transports and the send-email handler
//! - [`store`] - Sequence document persistence
//! - [`server`] - axum router and HTTP error mapping
//! - [`config`] - Environment-driven configuration
//! - [`telemetry`] - Tracing and panic-report setup

pub mod compiler;
pub mod config;
#[cfg(feature = "sqlite")]
pub mod db;
pub mod graph;
pub mod mailer;
pub mod scheduler;
pub mod server;
pub mod store;
#[cfg(feature = "sqlite")]
pub mod store_sqlite;
pub mod telemetry;
pub mod types;
