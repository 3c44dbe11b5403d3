use crate::graph::QuestionGraph;
use crate::store::FieldStore;

pub type VisibilityMap = std::collections::BTreeMap<String, bool>;

/// How a predicate that cannot be decided yet is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityMode {
    Visible,
    Hidden,
}

pub fn resolve_visibility(
    graph: &QuestionGraph,
    store: &FieldStore,
    mode: VisibilityMode,
) -> VisibilityMap {
    graph
        .questions()
        .iter()
        .map(|question| {
            let visible = match graph.is_reachable(&question.id, store) {
                Some(value) => value,
                None => mode == VisibilityMode::Visible,
            };
            (question.id.clone(), visible)
        })
        .collect()
}
