use std::sync::Arc;

use flow_spec::{
    AnswerSet, DraftSnapshot, DraftStore, FieldStore, FlowError, Navigator, Position,
    QuestionGraph, QuestionSpec, Recorded, RenderPayload, StepProgress, StorageError,
    build_render_payload, progress, submission,
};
use serde_json::Value;

/// What the caller should do after a forward move.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// Ask this question next.
    Asking(String),
    /// The flow finished; these are the answers on the path taken.
    Completed(AnswerSet),
}

/// How to leave an unfinished flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    Save,
    Discard,
}

/// One running flow: navigator, answers, and the draft store they autosave to.
///
/// Draft writes are best effort. A failing store is logged and navigation
/// carries on.
pub struct FlowSession {
    navigator: Navigator,
    store: FieldStore,
    drafts: Arc<dyn DraftStore>,
    autosave: bool,
}

impl FlowSession {
    /// Begins `graph` from its first question with no answers.
    pub fn start(graph: Arc<QuestionGraph>, drafts: Arc<dyn DraftStore>) -> Self {
        let store = FieldStore::new();
        let navigator = Navigator::start(graph, &store);
        Self {
            navigator,
            store,
            drafts,
            autosave: true,
        }
    }

    /// Continues from the stored draft when one exists and still fits the
    /// flow; otherwise starts fresh.
    pub fn resume(graph: Arc<QuestionGraph>, drafts: Arc<dyn DraftStore>) -> Self {
        let flow_id = graph.id().to_string();
        let snapshot = match drafts.load(&flow_id) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(
                    flow = %flow_id,
                    error = %err,
                    "could not read draft; starting fresh"
                );
                None
            }
        };
        let Some(snapshot) = snapshot else {
            return Self::start(graph, drafts);
        };

        match snapshot.restore(graph.clone()) {
            Ok((navigator, store)) => {
                tracing::debug!(flow = %flow_id, position = ?navigator.current(), "resumed draft");
                Self {
                    navigator,
                    store,
                    drafts,
                    autosave: true,
                }
            }
            Err(rejection) => {
                tracing::warn!(flow = %flow_id, reason = %rejection, "discarding stale draft");
                if let Err(err) = drafts.discard(&flow_id) {
                    tracing::warn!(flow = %flow_id, error = %err, "could not discard stale draft");
                }
                Self::start(graph, drafts)
            }
        }
    }

    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn graph(&self) -> &Arc<QuestionGraph> {
        self.navigator.graph()
    }

    pub fn position(&self) -> &Position {
        self.navigator.current()
    }

    pub fn current_question(&self) -> Option<&QuestionSpec> {
        self.navigator.current_question()
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn can_go_back(&self) -> bool {
        !self.navigator.history().is_empty()
    }

    /// Records `value` for the current question. Re-submitting an identical
    /// value changes nothing and writes no draft.
    pub fn answer(&mut self, value: Value) -> Result<Recorded, FlowError> {
        let key = self
            .navigator
            .current()
            .key()
            .ok_or(FlowError::AlreadyComplete)?
            .to_string();
        let recorded = self.navigator.record(&mut self.store, &key, value);
        if recorded.changed {
            self.autosave();
        }
        Ok(recorded)
    }

    /// Records `value` and moves forward.
    pub fn submit(&mut self, value: Value) -> Result<SessionStep, FlowError> {
        self.answer(value)?;
        self.forward()
    }

    /// Moves forward keeping whatever is already recorded; optional
    /// questions left blank are passed.
    pub fn skip(&mut self) -> Result<SessionStep, FlowError> {
        self.forward()
    }

    pub fn back(&mut self) -> Result<&Position, FlowError> {
        self.navigator.retreat()?;
        self.autosave();
        Ok(self.navigator.current())
    }

    pub fn progress(&self) -> StepProgress {
        progress(self.graph(), &self.store, self.navigator.current())
    }

    pub fn render_payload(&self) -> RenderPayload {
        build_render_payload(self.graph(), &self.store, self.navigator.state())
    }

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot::capture(self.graph(), self.navigator.state(), &self.store)
    }

    /// Leaves the flow, keeping or dropping its draft.
    pub fn exit(self, mode: ExitMode) -> Result<(), StorageError> {
        let flow_id = self.graph().id();
        match mode {
            ExitMode::Save => self.drafts.save(flow_id, &self.snapshot()),
            ExitMode::Discard => self.drafts.discard(flow_id),
        }
    }

    fn forward(&mut self) -> Result<SessionStep, FlowError> {
        self.navigator.advance(&mut self.store)?;
        match self.navigator.current() {
            Position::Question(key) => {
                let key = key.clone();
                self.autosave();
                Ok(SessionStep::Asking(key))
            }
            Position::Done => Ok(SessionStep::Completed(self.complete())),
        }
    }

    fn complete(&mut self) -> AnswerSet {
        let graph = self.graph().clone();
        if let Err(err) = self.drafts.discard(graph.id()) {
            tracing::warn!(flow = %graph.id(), error = %err, "could not discard finished draft");
        }
        self.store.mark_clean();
        tracing::debug!(flow = %graph.id(), "flow completed");
        AnswerSet {
            flow_id: graph.id().to_string(),
            flow_version: graph.version().to_string(),
            answers: submission(&graph, &self.store),
        }
    }

    fn autosave(&mut self) {
        if !self.autosave {
            return;
        }
        let flow_id = self.graph().id().to_string();
        match self.drafts.save(&flow_id, &self.snapshot()) {
            Ok(()) => self.store.mark_clean(),
            Err(err) => tracing::warn!(flow = %flow_id, error = %err, "draft autosave failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_spec::{Expr, FlowSpec, MemoryDraftStore, QuestionKind};
    use serde_json::json;

    struct BrokenStore;

    impl DraftStore for BrokenStore {
        fn save(&self, _: &str, _: &DraftSnapshot) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".into()))
        }

        fn load(&self, _: &str) -> Result<Option<DraftSnapshot>, StorageError> {
            Err(StorageError::Unavailable("disk full".into()))
        }

        fn discard(&self, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("disk full".into()))
        }

        fn list(&self) -> Result<Vec<String>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn occupancy_graph() -> Arc<QuestionGraph> {
        let occupied = Expr::Eq {
            key: "occupied".into(),
            value: json!("yes"),
        };
        let spec = FlowSpec::new(
            "occupancy",
            vec![
                QuestionSpec::new("occupied", QuestionKind::SingleChoice, "Occupied?")
                    .with_choices(["yes", "no"])
                    .route(Some(occupied.clone()), "tenant")
                    .route(None, "headline"),
                QuestionSpec::new("tenant", QuestionKind::FreeText, "Tenant name")
                    .visible_if(occupied),
                QuestionSpec::new("headline", QuestionKind::FreeText, "Headline"),
            ],
        );
        Arc::new(QuestionGraph::new(spec).expect("graph"))
    }

    #[test]
    fn identical_answer_does_not_write_a_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());

        assert!(session.answer(json!("yes")).expect("answer").changed);
        assert_eq!(drafts.writes(), 1);
        assert!(!session.answer(json!("yes")).expect("answer").changed);
        assert_eq!(drafts.writes(), 1);
    }

    #[test]
    fn failing_store_never_blocks_navigation() {
        let mut session = FlowSession::start(occupancy_graph(), Arc::new(BrokenStore));
        assert_eq!(
            session.submit(json!("no")).expect("submit"),
            SessionStep::Asking("headline".into())
        );
        assert_eq!(session.back().expect("back"), &Position::Question("occupied".into()));
        session.skip().expect("skip keeps the recorded answer");
        let step = session.submit(json!("Corner lot")).expect("submit");
        assert!(matches!(step, SessionStep::Completed(_)));
    }

    #[test]
    fn completion_submits_live_answers_and_discards_the_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());
        session.submit(json!("yes")).expect("occupied");
        session.submit(json!("R. Diaz")).expect("tenant");
        assert_eq!(drafts.list().expect("list"), vec!["occupancy"]);

        let SessionStep::Completed(answers) = session.submit(json!("Corner lot")).expect("done")
        else {
            panic!("flow should be complete");
        };
        assert_eq!(answers.flow_id, "occupancy");
        assert_eq!(answers.answers["tenant"], "R. Diaz");
        assert!(drafts.list().expect("list").is_empty());
    }

    #[test]
    fn switching_branch_drops_answers_from_the_saved_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());
        session.submit(json!("yes")).expect("occupied");
        session.submit(json!("R. Diaz")).expect("tenant");
        session.back().expect("back to tenant");
        session.back().expect("back to occupied");

        let recorded = session.answer(json!("no")).expect("answer");
        assert_eq!(recorded.cleared, vec!["tenant"]);
        let draft = drafts.load("occupancy").expect("load").expect("draft");
        assert!(!draft.answers.contains_key("tenant"));
    }

    #[test]
    fn resume_continues_where_the_user_left_off() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());
        session.submit(json!("no")).expect("occupied");
        session.exit(ExitMode::Save).expect("save");

        let resumed = FlowSession::resume(occupancy_graph(), drafts.clone());
        assert_eq!(resumed.position(), &Position::Question("headline".into()));
        assert_eq!(resumed.store().get("occupied"), Some(&json!("no")));
        assert!(resumed.can_go_back());
    }

    #[test]
    fn stale_draft_is_discarded_and_flow_restarts() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());
        session.submit(json!("no")).expect("occupied");
        let mut stale = session.snapshot();
        stale.flow_version = "0.9.0".into();
        drafts.save("occupancy", &stale).expect("save");

        let resumed = FlowSession::resume(occupancy_graph(), drafts.clone());
        assert_eq!(resumed.position(), &Position::Question("occupied".into()));
        assert!(resumed.store().is_empty());
        assert!(drafts.load("occupancy").expect("load").is_none());
    }

    #[test]
    fn unreadable_store_starts_fresh() {
        let session = FlowSession::resume(occupancy_graph(), Arc::new(BrokenStore));
        assert_eq!(session.position(), &Position::Question("occupied".into()));
    }

    #[test]
    fn exit_with_discard_removes_the_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session = FlowSession::start(occupancy_graph(), drafts.clone());
        session.submit(json!("no")).expect("occupied");
        session.exit(ExitMode::Discard).expect("discard");
        assert!(drafts.load("occupancy").expect("load").is_none());
    }

    #[test]
    fn autosave_can_be_turned_off() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut session =
            FlowSession::start(occupancy_graph(), drafts.clone()).with_autosave(false);
        session.submit(json!("no")).expect("occupied");
        assert_eq!(drafts.writes(), 0);
    }
}
