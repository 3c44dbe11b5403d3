#![allow(dead_code)]

use std::sync::Arc;

use flow_spec::{FlowSpec, QuestionGraph};

pub fn fixture(name: &str) -> &'static str {
    match name {
        "branching" => include_str!("fixtures/branching.json"),
        "financing" => include_str!("fixtures/financing.json"),
        "documents" => include_str!("fixtures/documents.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

pub fn graph(name: &str) -> Arc<QuestionGraph> {
    let spec: FlowSpec = serde_json::from_str(fixture(name)).expect("deserialize");
    Arc::new(QuestionGraph::new(spec).expect("valid graph"))
}
