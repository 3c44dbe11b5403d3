use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::question::QuestionSpec;

/// Top-level declarative flow: an ordered question table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FlowSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Overrides the first declared question as the entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub questions: Vec<QuestionSpec>,
}

impl FlowSpec {
    pub fn new(id: impl Into<String>, questions: Vec<QuestionSpec>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            version: "1.0.0".into(),
            description: None,
            start: None,
            questions,
        }
    }
}
