use serde_json::{Map, Value, json};

use crate::{
    graph::QuestionGraph,
    navigator::FlowState,
    progress::{StepProgress, progress},
    spec::{QuestionKind, QuestionSpec},
    store::FieldStore,
    visibility::{VisibilityMode, resolve_visibility},
};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// The current question is waiting for an answer.
    NeedInput,
    /// The flow reached its end.
    Complete,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "complete" => RenderStatus::Complete,
            _ => RenderStatus::NeedInput,
        }
    }
}

/// Describes a single question for render outputs.
#[derive(Debug, Clone)]
pub struct RenderQuestion {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: QuestionKind,
    pub required: bool,
    pub visible: bool,
    pub current_value: Option<Value>,
    pub choices: Option<Vec<String>>,
    pub fields: Vec<RenderQuestion>,
}

impl RenderQuestion {
    fn from_spec(question: &QuestionSpec, visible: bool, current_value: Option<Value>) -> Self {
        let nested = current_value.as_ref().and_then(Value::as_object);
        let fields = question
            .fields
            .iter()
            .map(|field| {
                let value = nested.and_then(|values| values.get(&field.id)).cloned();
                RenderQuestion::from_spec(field, true, value)
            })
            .collect();
        Self {
            id: question.id.clone(),
            title: question.title.clone(),
            description: question.description.clone(),
            kind: question.kind,
            required: question.required,
            visible,
            current_value,
            choices: question.choices.clone(),
            fields,
        }
    }
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub flow_id: String,
    pub flow_title: String,
    pub flow_version: String,
    pub status: RenderStatus,
    pub current_question_id: Option<String>,
    pub progress: StepProgress,
    pub can_go_back: bool,
    pub help: Option<String>,
    pub questions: Vec<RenderQuestion>,
}

impl RenderPayload {
    pub fn current_question(&self) -> Option<&RenderQuestion> {
        self.current_question_id
            .as_deref()
            .and_then(|id| self.questions.iter().find(|question| question.id == id))
    }
}

/// Build the renderer payload from the graph, answers, and navigator state.
pub fn build_render_payload(
    graph: &QuestionGraph,
    store: &FieldStore,
    state: &FlowState,
) -> RenderPayload {
    let visibility = resolve_visibility(graph, store, VisibilityMode::Visible);
    let questions = graph
        .questions()
        .iter()
        .map(|question| {
            RenderQuestion::from_spec(
                question,
                visibility.get(&question.id).copied().unwrap_or(true),
                store.get(&question.id).cloned(),
            )
        })
        .collect();

    let current_question_id = state.current.key().map(str::to_string);
    let status = if current_question_id.is_some() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    RenderPayload {
        flow_id: graph.id().to_string(),
        flow_title: graph.title().to_string(),
        flow_version: graph.version().to_string(),
        status,
        current_question_id,
        progress: progress(graph, store, &state.current),
        can_go_back: !state.history.is_empty(),
        help: graph.spec().description.clone(),
        questions,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let questions = payload
        .questions
        .iter()
        .map(question_json)
        .collect::<Vec<_>>();

    json!({
        "flow_id": payload.flow_id,
        "flow_title": payload.flow_title,
        "flow_version": payload.flow_version,
        "status": payload.status.as_str(),
        "current_question_id": payload.current_question_id,
        "progress": {
            "step": payload.progress.step,
            "total": payload.progress.total,
            "answered": payload.progress.answered,
        },
        "can_go_back": payload.can_go_back,
        "help": payload.help,
        "questions": questions,
    })
}

fn question_json(question: &RenderQuestion) -> Value {
    let mut map = Map::new();
    map.insert("id".into(), Value::String(question.id.clone()));
    map.insert("title".into(), Value::String(question.title.clone()));
    map.insert(
        "description".into(),
        question
            .description
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
    );
    map.insert("type".into(), Value::String(question.kind.as_str().into()));
    map.insert("required".into(), Value::Bool(question.required));
    if let Some(current_value) = &question.current_value {
        map.insert("current_value".into(), current_value.clone());
    }
    if let Some(choices) = &question.choices {
        map.insert(
            "choices".into(),
            Value::Array(choices.iter().cloned().map(Value::String).collect()),
        );
    }
    if !question.fields.is_empty() {
        map.insert(
            "fields".into(),
            Value::Array(question.fields.iter().map(question_json).collect()),
        );
    }
    map.insert("visible".into(), Value::Bool(question.visible));
    Value::Object(map)
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Flow: {} ({})", payload.flow_title, payload.flow_id));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    match payload.current_question() {
        Some(question) => {
            lines.push(format!(
                "Question {} of {}: {}",
                payload.progress.step, payload.progress.total, question.title
            ));
            if let Some(description) = &question.description {
                lines.push(format!("  {}", description));
            }
            if let Some(choices) = &question.choices {
                lines.push(format!("  Choices: {}", choices.join(", ")));
            }
            for field in &question.fields {
                let marker = if field.required { " [required]" } else { "" };
                lines.push(format!("  - {} ({}){}", field.id, field.title, marker));
            }
            if let Some(value) = &question.current_value {
                lines.push(format!("  Current value: {}", value_to_display(value)));
            }
        }
        None => lines.push(format!(
            "Status: {} ({} answered)",
            payload.status.as_str(),
            payload.progress.answered
        )),
    }

    lines.join("\n")
}

pub fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_display)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Null => "(skipped)".to_string(),
        other => other.to_string(),
    }
}
