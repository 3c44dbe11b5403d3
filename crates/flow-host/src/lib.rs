pub mod catalog;
pub mod config;
pub mod error;
pub mod fs_store;
pub mod router;
pub mod session;

pub use catalog::FlowCatalog;
pub use config::{DRAFT_DIR_ENV, DraftFormat, FLOWS_DIR_ENV, HostConfig};
pub use error::HostError;
pub use fs_store::FileDraftStore;
pub use router::{RecordingRouter, View, ViewRouter};
pub use session::{ExitMode, FlowSession, SessionStep};

use serde_json::{Map, Value, json};

use flow_spec::{
    FieldStore, Position, QuestionGraph, is_answered, live_path, progress, validate,
};

// JSON-in, JSON-out entry points for hosts that drive flows over a string
// boundary. Failures come back as `{"error": "..."}`.

fn respond(result: Result<Value, HostError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn parse_answers(answers_json: &str) -> Result<Map<String, Value>, HostError> {
    if answers_json.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_str(answers_json).map_err(HostError::AnswersParse)?;
    Ok(value.as_object().cloned().unwrap_or_default())
}

/// The flow definition as JSON.
pub fn describe(catalog: &FlowCatalog, flow_id: &str) -> String {
    respond(catalog.get(flow_id).and_then(|graph| {
        serde_json::to_value(graph.spec()).map_err(HostError::JsonEncode)
    }))
}

pub fn validate_answers(catalog: &FlowCatalog, flow_id: &str, answers_json: &str) -> String {
    respond(catalog.get(flow_id).and_then(|graph| {
        let answers = Value::Object(parse_answers(answers_json)?);
        serde_json::to_value(validate(&graph, &answers)).map_err(HostError::JsonEncode)
    }))
}

/// First question on the live path still missing a required answer, with
/// "step X of Y" counters.
pub fn next(catalog: &FlowCatalog, flow_id: &str, answers_json: &str) -> String {
    respond(catalog.get(flow_id).and_then(|graph| {
        let store = FieldStore::from_answers(parse_answers(answers_json)?);
        let position = next_position(&graph, &store);
        let counters = progress(&graph, &store, &position);
        Ok(json!({
            "status": if position.is_done() { "complete" } else { "need_input" },
            "next_question_id": position.key(),
            "progress": {
                "step": counters.step,
                "total": counters.total,
                "answered": counters.answered,
            }
        }))
    }))
}

fn next_position(graph: &QuestionGraph, store: &FieldStore) -> Position {
    live_path(graph, store)
        .into_iter()
        .find(|key| {
            graph
                .node_for(key)
                .is_some_and(|question| !is_answered(question, store))
        })
        .map(Position::Question)
        .unwrap_or(Position::Done)
}
