use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::FlowError;
use crate::graph::QuestionGraph;
use crate::navigator::{FlowState, Navigator};
use crate::store::FieldStore;

/// Layout version of [`DraftSnapshot`]; bump on any shape change.
pub const DRAFT_SCHEMA_VERSION: u32 = 1;

/// Persisted, resumable copy of an in-progress flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub schema_version: u32,
    pub flow_id: String,
    pub flow_version: String,
    pub state: FlowState,
    #[serde(default)]
    pub answers: Map<String, Value>,
    pub saved_at: DateTime<Utc>,
}

/// Why a stored draft cannot be resumed against the current flow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DraftRejection {
    #[error("draft layout version {found} is not supported (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },
    #[error("draft belongs to flow '{found}', not '{expected}'")]
    FlowId { found: String, expected: String },
    #[error("draft was saved for flow version {found}, current version is {expected}")]
    FlowVersion { found: String, expected: String },
    #[error("draft references unknown question '{0}'")]
    UnknownKey(String),
    #[error("draft navigation state cannot be restored: {0}")]
    InvalidState(String),
}

impl DraftSnapshot {
    pub fn capture(graph: &QuestionGraph, state: &FlowState, store: &FieldStore) -> Self {
        Self {
            schema_version: DRAFT_SCHEMA_VERSION,
            flow_id: graph.id().to_string(),
            flow_version: graph.version().to_string(),
            state: state.clone(),
            answers: store.answers(),
            saved_at: Utc::now(),
        }
    }

    /// Replaces navigator state and answers wholesale; nothing is merged.
    pub fn restore(
        self,
        graph: Arc<QuestionGraph>,
    ) -> Result<(Navigator, FieldStore), DraftRejection> {
        if self.schema_version != DRAFT_SCHEMA_VERSION {
            return Err(DraftRejection::SchemaVersion {
                found: self.schema_version,
                expected: DRAFT_SCHEMA_VERSION,
            });
        }
        if self.flow_id != graph.id() {
            return Err(DraftRejection::FlowId {
                found: self.flow_id,
                expected: graph.id().to_string(),
            });
        }
        if self.flow_version != graph.version() {
            return Err(DraftRejection::FlowVersion {
                found: self.flow_version,
                expected: graph.version().to_string(),
            });
        }
        if let Some(key) = self.answers.keys().find(|key| !graph.contains(key)) {
            return Err(DraftRejection::UnknownKey(key.clone()));
        }
        let navigator = Navigator::resume(graph, self.state).map_err(|err| match err {
            FlowError::UnknownQuestion(key) => DraftRejection::UnknownKey(key),
            other => DraftRejection::InvalidState(other.to_string()),
        })?;
        Ok((navigator, FieldStore::from_answers(self.answers)))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, serde_cbor::Error> {
        serde_cbor::from_slice(bytes)
    }
}
