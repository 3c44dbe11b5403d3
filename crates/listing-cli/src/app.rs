use std::sync::Arc;

use flow_host::{
    FileDraftStore, FlowCatalog, FlowSession, HostConfig, HostError, View, ViewRouter,
};
use flow_spec::DraftStore;

/// Router for the terminal: there is only one screen, so view changes are
/// logged rather than drawn.
#[derive(Debug, Default)]
pub struct TerminalRouter;

impl ViewRouter for TerminalRouter {
    fn go_to(&self, view: View) {
        tracing::info!(view = %view, "switching view");
    }
}

/// Process-wide state, created once in `main` and handed to every command.
pub struct AppContext {
    config: HostConfig,
    catalog: FlowCatalog,
    drafts: Arc<dyn DraftStore>,
    router: Arc<dyn ViewRouter>,
}

impl AppContext {
    pub fn init(config: HostConfig, router: Arc<dyn ViewRouter>) -> Result<Self, HostError> {
        let catalog = FlowCatalog::from_config(&config)?;
        let drafts: Arc<dyn DraftStore> = Arc::new(FileDraftStore::from_config(&config));
        tracing::debug!(
            flows = catalog.len(),
            draft_dir = %config.draft_dir.display(),
            "application context ready"
        );
        Ok(Self {
            config,
            catalog,
            drafts,
            router,
        })
    }

    pub fn with_drafts(mut self, drafts: Arc<dyn DraftStore>) -> Self {
        self.drafts = drafts;
        self
    }

    pub fn catalog(&self) -> &FlowCatalog {
        &self.catalog
    }

    pub fn drafts(&self) -> &Arc<dyn DraftStore> {
        &self.drafts
    }

    /// Opens `flow_id` and shows it; `resume` picks up a saved draft if one fits.
    pub fn open(&self, flow_id: &str, resume: bool) -> Result<FlowSession, HostError> {
        let graph = self.catalog.get(flow_id)?;
        let session = if resume {
            FlowSession::resume(graph, self.drafts.clone())
        } else {
            FlowSession::start(graph, self.drafts.clone())
        };
        self.router.go_to(View::Flow(flow_id.to_string()));
        Ok(session.with_autosave(self.config.autosave))
    }

    /// Called once a flow completes or the user leaves it.
    pub fn leave_flow(&self) {
        self.router.go_to(View::Dashboard);
    }

    pub fn teardown(self) {
        match self.drafts.list() {
            Ok(pending) if !pending.is_empty() => {
                tracing::debug!(?pending, "drafts kept for later");
            }
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "could not list drafts"),
        }
        tracing::debug!("application context torn down");
    }
}
