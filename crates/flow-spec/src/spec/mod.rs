pub mod flow;
pub mod question;

pub use flow::FlowSpec;
pub use question::{Constraint, DONE_TARGET, QuestionKind, QuestionSpec, Route, Target};
