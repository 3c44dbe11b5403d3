use std::path::PathBuf;

use flow_spec::{ConfigurationError, FlowError, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to parse host config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("flow '{0}' is not available")]
    FlowUnavailable(String),
    #[error("flow definition {name} is not valid json: {source}")]
    FlowParse {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("flow '{flow}' is misconfigured: {source}")]
    Configuration {
        flow: String,
        #[source]
        source: ConfigurationError,
    },
    #[error("flow '{0}' is defined more than once")]
    DuplicateFlow(String),
    #[error("answers are not valid json: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Flow(#[from] FlowError),
}
