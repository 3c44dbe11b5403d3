use thiserror::Error;

use crate::answers::ValidationError;

/// Malformed flow definition, reported when the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("flow '{0}' declares no questions")]
    EmptyFlow(String),
    #[error("question id '{0}' is declared more than once")]
    DuplicateKey(String),
    #[error("question id '{0}' is reserved")]
    ReservedKey(String),
    #[error("start question '{0}' does not exist")]
    UnknownStart(String),
    #[error("question '{from}' routes to unknown question '{to}'")]
    UnknownTarget { from: String, to: String },
    #[error("question '{question}' references unknown answer key '{key}'")]
    UnknownReference { question: String, key: String },
    #[error("question '{question}' depends on '{key}', which is only asked later")]
    ForwardReference { question: String, key: String },
    #[error("question '{0}' needs at least one choice")]
    MissingChoices(String),
    #[error("group '{0}' declares no fields")]
    EmptyGroup(String),
    #[error("group field '{field}' in '{group}' cannot itself be a group")]
    NestedGroup { group: String, field: String },
    #[error("question '{question}' has an invalid pattern: {reason}")]
    InvalidPattern { question: String, reason: String },
    #[error("routing cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("question '{0}' can never be reached from the start")]
    Orphan(String),
    #[error("flow '{0}' can never reach its end")]
    TerminalUnreachable(String),
}

/// Navigation failures surfaced to the caller without changing flow state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("there is no previous question to return to")]
    NoHistory,
    #[error("the flow is already complete")]
    AlreadyComplete,
    #[error("question '{0}' is not part of this flow")]
    UnknownQuestion(String),
}

/// Draft persistence failure; callers log it and keep going.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("draft io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("draft json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("draft cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("draft store unavailable: {0}")]
    Unavailable(String),
    #[error("draft id '{0}' is not a plain file name")]
    InvalidId(String),
}
