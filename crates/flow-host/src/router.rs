use std::fmt;
use std::sync::Mutex;

/// Top-level screens the application can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Flow(String),
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Dashboard => f.write_str("dashboard"),
            View::Flow(id) => write!(f, "flow:{}", id),
        }
    }
}

/// Switches the displayed view. Sessions never call this themselves; the
/// owning application does once a flow completes or is exited.
pub trait ViewRouter: Send + Sync {
    fn go_to(&self, view: View);
}

/// Router that only remembers where it was sent.
#[derive(Debug, Default)]
pub struct RecordingRouter {
    visits: Mutex<Vec<View>>,
}

impl RecordingRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visits(&self) -> Vec<View> {
        self.visits
            .lock()
            .map(|visits| visits.clone())
            .unwrap_or_default()
    }
}

impl ViewRouter for RecordingRouter {
    fn go_to(&self, view: View) {
        if let Ok(mut visits) = self.visits.lock() {
            visits.push(view);
        }
    }
}
