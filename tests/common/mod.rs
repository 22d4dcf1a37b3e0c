//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::{Map, Value, json};

use coldflow::graph::{Edge, Node, Position, SequenceGraph};
use coldflow::types::NodeKind;

pub fn node(id: &str, kind: &str, data: Value) -> Node {
    let data = match data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Node {
        id: id.to_string(),
        kind: NodeKind::from(kind),
        position: Position::default(),
        data,
    }
}

pub fn edge(id: &str, source: &str, target: &str) -> Edge {
    Edge {
        id: id.to_string(),
        source: source.to_string(),
        target: target.to_string(),
    }
}

/// input -> wait(2h) -> coldEmail(A) -> wait(3h) -> coldEmail(B)
pub fn two_email_chain() -> SequenceGraph {
    SequenceGraph::new(
        vec![
            node("start", "input", json!({})),
            node("w1", "wait", json!({"duration": 2})),
            node("a", "coldEmail", json!({"subject": "A", "body": "first"})),
            node("w2", "wait", json!({"duration": 3})),
            node("b", "coldEmail", json!({"subject": "B", "body": "second"})),
        ],
        vec![
            edge("e1", "start", "w1"),
            edge("e2", "w1", "a"),
            edge("e3", "a", "w2"),
            edge("e4", "w2", "b"),
        ],
    )
}

/// The same chain as a request body for `POST /api/sequence`.
pub fn two_email_chain_body(name: &str) -> Value {
    let graph = two_email_chain();
    json!({
        "name": name,
        "nodes": graph.nodes,
        "edges": graph.edges,
    })
}
