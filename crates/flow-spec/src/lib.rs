#![allow(missing_docs)]

pub mod answers;
pub mod draft;
pub mod error;
pub mod expr;
pub mod graph;
pub mod navigator;
pub mod progress;
pub mod render;
pub mod spec;
pub mod storage;
pub mod store;
pub mod validate;
pub mod visibility;

pub use answers::{AnswerSet, ValidationError, ValidationResult};
pub use draft::{DRAFT_SCHEMA_VERSION, DraftRejection, DraftSnapshot};
pub use error::{ConfigurationError, FlowError, StorageError};
pub use expr::{AnswerLookup, Expr, Lookup};
pub use graph::QuestionGraph;
pub use navigator::{FlowState, Navigator, Position, Recorded, is_answered, live_path, submission};
pub use progress::{StepProgress, progress, step_number, total_steps};
pub use render::{
    RenderPayload, RenderQuestion, RenderStatus, build_render_payload, render_json_ui,
    render_text,
};
pub use spec::{Constraint, DONE_TARGET, FlowSpec, QuestionKind, QuestionSpec, Route};
pub use storage::{DraftStore, MemoryDraftStore};
pub use store::FieldStore;
pub use validate::{validate, validate_answer};
pub use visibility::{VisibilityMap, VisibilityMode, resolve_visibility};
