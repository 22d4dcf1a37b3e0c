//! Benchmarks for sequence compilation.
//!
//! Measures the graph walk and job emission over linear chains of growing
//! size (alternating wait and cold-email nodes).

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use serde_json::{Map, json};

use coldflow::compiler::{CompileOptions, compile};
use coldflow::graph::{Edge, Node, Position, SequenceGraph};
use coldflow::types::NodeKind;

fn make_node(id: String, kind: &str, data: serde_json::Value) -> Node {
    let data = match data {
        serde_json::Value::Object(map) => map,
        _ => Map::new(),
    };
    Node {
        id,
        kind: NodeKind::from(kind),
        position: Position::default(),
        data,
    }
}

/// Build a linear chain: input -> wait -> coldEmail -> wait -> ... of `steps`
/// alternating nodes.
fn build_linear_chain(steps: usize) -> SequenceGraph {
    let mut nodes = vec![make_node("start".to_string(), "input", json!({}))];
    let mut edges = Vec::new();
    let mut previous = "start".to_string();
    for i in 0..steps {
        let id = format!("n{i}");
        let node = if i % 2 == 0 {
            make_node(id.clone(), "wait", json!({"duration": 2}))
        } else {
            make_node(
                id.clone(),
                "coldEmail",
                json!({"subject": "Hi", "body": "Hello"}),
            )
        };
        nodes.push(node);
        edges.push(Edge {
            id: format!("e{i}"),
            source: previous.clone(),
            target: id.clone(),
        });
        previous = id;
    }
    SequenceGraph::new(nodes, edges)
}

fn bench_compile_linear(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_linear_chain");
    for steps in [10, 100, 1000] {
        let graph = build_linear_chain(steps);
        group.bench_with_input(BenchmarkId::from_parameter(steps), &graph, |b, graph| {
            let now = Utc::now();
            let options = CompileOptions::default();
            b.iter(|| compile(graph, "bench-seq", now, &options).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_compile_linear);
criterion_main!(benches);
