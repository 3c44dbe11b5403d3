use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::draft::DraftSnapshot;
use crate::error::StorageError;

/// Keyed draft persistence used by hosts.
pub trait DraftStore: Send + Sync {
    fn save(&self, flow_id: &str, snapshot: &DraftSnapshot) -> Result<(), StorageError>;
    fn load(&self, flow_id: &str) -> Result<Option<DraftSnapshot>, StorageError>;
    fn discard(&self, flow_id: &str) -> Result<(), StorageError>;
    /// Flow ids that currently have a draft.
    fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// In-process draft store; counts writes so callers can observe autosave.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<String, DraftSnapshot>>,
    writes: AtomicUsize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, DraftSnapshot>>, StorageError> {
        self.drafts
            .lock()
            .map_err(|_| StorageError::Unavailable("draft map lock poisoned".into()))
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, flow_id: &str, snapshot: &DraftSnapshot) -> Result<(), StorageError> {
        self.lock()?.insert(flow_id.to_string(), snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, flow_id: &str) -> Result<Option<DraftSnapshot>, StorageError> {
        Ok(self.lock()?.get(flow_id).cloned())
    }

    fn discard(&self, flow_id: &str) -> Result<(), StorageError> {
        self.lock()?.remove(flow_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut ids: Vec<String> = self.lock()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
