use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::answers::ValidationError;
use crate::error::FlowError;
use crate::graph::{Edge, QuestionGraph};
use crate::spec::QuestionSpec;
use crate::store::FieldStore;
use crate::validate::validate_answer;

/// Where a flow currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    Question(String),
    Done,
}

impl Position {
    pub fn key(&self) -> Option<&str> {
        match self {
            Position::Question(key) => Some(key),
            Position::Done => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Position::Done)
    }
}

/// Serializable navigator state; a draft restores exactly this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowState {
    pub current: Position,
    #[serde(default)]
    pub history: Vec<String>,
}

/// Result of recording an answer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Recorded {
    pub changed: bool,
    /// Keys dropped because their questions left the live path.
    pub cleared: Vec<String>,
}

/// Walks a question graph forward and backward.
#[derive(Debug, Clone)]
pub struct Navigator {
    graph: Arc<QuestionGraph>,
    state: FlowState,
}

impl Navigator {
    /// Positions the navigator on the first reachable question.
    pub fn start(graph: Arc<QuestionGraph>, store: &FieldStore) -> Self {
        let current = position_of(&graph, graph.resolve(Edge::Node(graph.start_index()), store));
        Self {
            graph,
            state: FlowState {
                current,
                history: Vec::new(),
            },
        }
    }

    /// Restores a saved state; every key it names must exist in the graph.
    pub fn resume(graph: Arc<QuestionGraph>, state: FlowState) -> Result<Self, FlowError> {
        let unknown = state
            .current
            .key()
            .into_iter()
            .chain(state.history.iter().map(String::as_str))
            .find(|key| !graph.contains(key));
        if let Some(key) = unknown {
            return Err(FlowError::UnknownQuestion(key.to_string()));
        }
        Ok(Self { graph, state })
    }

    pub fn graph(&self) -> &Arc<QuestionGraph> {
        &self.graph
    }

    pub fn current(&self) -> &Position {
        &self.state.current
    }

    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.state
            .current
            .key()
            .and_then(|key| self.graph.node_for(key))
    }

    pub fn history(&self) -> &[String] {
        &self.state.history
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.current.is_done()
    }

    /// Moves to the next reachable question once the current one is answered.
    ///
    /// An optional question left blank is recorded as `null` so predicates
    /// further on treat it as decided.
    pub fn advance(&mut self, store: &mut FieldStore) -> Result<&Position, FlowError> {
        let key = match &self.state.current {
            Position::Done => return Err(FlowError::AlreadyComplete),
            Position::Question(key) => key.clone(),
        };
        let node = self
            .graph
            .index_of(&key)
            .ok_or_else(|| FlowError::UnknownQuestion(key.clone()))?;
        let question = self.graph.question(node);

        match store.get(&key) {
            Some(value) if !is_blank(value) => {
                if let Some(error) = validate_answer(question, value) {
                    return Err(error.into());
                }
            }
            _ if question.required => {
                return Err(ValidationError::for_question(
                    &key,
                    "this question requires an answer",
                    "required",
                )
                .into());
            }
            _ => {
                store.set(key.clone(), Value::Null);
            }
        }

        let next = self.graph.resolve(self.graph.route(node, store), store);
        self.state.history.push(key);
        self.state.current = position_of(&self.graph, next);
        tracing::debug!(
            flow = %self.graph.id(),
            from = %self.state.history.last().map(String::as_str).unwrap_or_default(),
            to = ?self.state.current,
            "advanced"
        );
        Ok(&self.state.current)
    }

    /// Returns to the previously visited question exactly as it was reached.
    pub fn retreat(&mut self) -> Result<&Position, FlowError> {
        let previous = self.state.history.pop().ok_or(FlowError::NoHistory)?;
        tracing::debug!(flow = %self.graph.id(), to = %previous, "retreated");
        self.state.current = Position::Question(previous);
        Ok(&self.state.current)
    }

    /// Whether the current question satisfies its required flag.
    pub fn is_answered(&self, store: &FieldStore) -> bool {
        self.current_question()
            .is_some_and(|question| is_answered(question, store))
    }

    /// Stores an answer and clears answers whose questions dropped off the
    /// live path because of it.
    pub fn record(&self, store: &mut FieldStore, key: &str, value: Value) -> Recorded {
        let mut before: BTreeSet<String> = live_path(&self.graph, store).into_iter().collect();
        if !store.set(key, value) {
            return Recorded::default();
        }

        let mut cleared = Vec::new();
        loop {
            let after: BTreeSet<String> = live_path(&self.graph, store).into_iter().collect();
            let stale: Vec<&String> = before
                .difference(&after)
                .filter(|stale| stale.as_str() != key && store.contains(stale))
                .collect();
            if stale.is_empty() {
                break;
            }
            cleared.extend(store.clear_many(stale));
            before = after;
        }

        if !cleared.is_empty() {
            tracing::debug!(
                flow = %self.graph.id(),
                key,
                ?cleared,
                "cleared answers from abandoned branch"
            );
        }
        Recorded {
            changed: true,
            cleared,
        }
    }
}

/// Whether `question` counts as answered in `store`.
pub fn is_answered(question: &QuestionSpec, store: &FieldStore) -> bool {
    if !question.required {
        return true;
    }
    store.get(&question.id).is_some_and(|value| !is_blank(value))
}

/// Question keys visited when walking from the start with the current answers.
pub fn live_path(graph: &QuestionGraph, store: &FieldStore) -> Vec<String> {
    let mut path = Vec::new();
    let mut node = graph.resolve(Edge::Node(graph.start_index()), store);
    while let Some(current) = node {
        path.push(graph.key(current).to_string());
        node = graph.resolve(graph.route(current, store), store);
    }
    path
}

/// Answers belonging to the live path; stale and blank values are left out.
pub fn submission(graph: &QuestionGraph, store: &FieldStore) -> Map<String, Value> {
    live_path(graph, store)
        .into_iter()
        .filter_map(|key| {
            store
                .get(&key)
                .filter(|value| !value.is_null())
                .cloned()
                .map(|value| (key, value))
        })
        .collect()
}

pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn position_of(graph: &QuestionGraph, node: Option<usize>) -> Position {
    match node {
        Some(node) => Position::Question(graph.key(node).to_string()),
        None => Position::Done,
    }
}
