use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use flow_spec::{DraftSnapshot, DraftStore, StorageError};

use crate::config::{DraftFormat, HostConfig};

/// Draft store keeping one `<flow_id>.draft.<ext>` file per flow.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
    format: DraftFormat,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>, format: DraftFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.draft_dir.clone(), config.draft_format)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the draft for `flow_id`; ids that could leave the draft
    /// directory are refused.
    pub fn path_for(&self, flow_id: &str) -> Result<PathBuf, StorageError> {
        let plain = !flow_id.is_empty()
            && !flow_id.starts_with('.')
            && !flow_id.contains(['/', '\\'])
            && !flow_id.contains("..");
        if !plain {
            return Err(StorageError::InvalidId(flow_id.to_string()));
        }
        Ok(self.dir.join(format!("{}{}", flow_id, self.suffix())))
    }

    fn suffix(&self) -> String {
        format!(".draft.{}", self.format.extension())
    }

    fn encode(&self, snapshot: &DraftSnapshot) -> Result<Vec<u8>, StorageError> {
        Ok(match self.format {
            DraftFormat::Json => snapshot.to_json()?.into_bytes(),
            DraftFormat::Cbor => snapshot.to_cbor()?,
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<DraftSnapshot, StorageError> {
        Ok(match self.format {
            DraftFormat::Json => serde_json::from_slice(bytes)?,
            DraftFormat::Cbor => DraftSnapshot::from_cbor(bytes)?,
        })
    }
}

impl DraftStore for FileDraftStore {
    /// Writes to a sibling temp file first so a crash never leaves a torn draft.
    fn save(&self, flow_id: &str, snapshot: &DraftSnapshot) -> Result<(), StorageError> {
        let target = self.path_for(flow_id)?;
        fs::create_dir_all(&self.dir)?;
        let bytes = self.encode(snapshot)?;
        let staging = self.dir.join(format!(".{}{}.tmp", flow_id, self.suffix()));
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &target)?;
        tracing::debug!(flow = flow_id, path = %target.display(), "draft saved");
        Ok(())
    }

    fn load(&self, flow_id: &str) -> Result<Option<DraftSnapshot>, StorageError> {
        match fs::read(self.path_for(flow_id)?) {
            Ok(bytes) => self.decode(&bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn discard(&self, flow_id: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(flow_id)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let suffix = self.suffix();
        let mut ids = Vec::new();
        for entry in entries {
            let name = entry?.file_name();
            if let Some(id) = name
                .to_str()
                .filter(|name| !name.starts_with('.'))
                .and_then(|name| name.strip_suffix(&suffix))
            {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use flow_spec::{FieldStore, FlowSpec, Navigator, QuestionGraph, QuestionKind, QuestionSpec};
    use serde_json::json;
    use tempfile::TempDir;

    fn snapshot() -> DraftSnapshot {
        let spec = FlowSpec::new(
            "media",
            vec![
                QuestionSpec::new("caption", QuestionKind::FreeText, "Caption"),
                QuestionSpec::new("photos", QuestionKind::File, "Photos"),
            ],
        );
        let graph = Arc::new(QuestionGraph::new(spec).expect("graph"));
        let mut store = FieldStore::new();
        let mut navigator = Navigator::start(graph.clone(), &store);
        navigator.record(&mut store, "caption", json!("Sunny two-bed"));
        navigator.advance(&mut store).expect("advance");
        DraftSnapshot::capture(&graph, navigator.state(), &store)
    }

    #[test]
    fn json_drafts_round_trip_through_disk() {
        let dir = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(dir.path().join("drafts"), DraftFormat::Json);
        let draft = snapshot();

        drafts.save("media", &draft).expect("save");
        assert!(dir.path().join("drafts/media.draft.json").is_file());
        assert_eq!(drafts.load("media").expect("load"), Some(draft));
        assert_eq!(drafts.list().expect("list"), vec!["media"]);
    }

    #[test]
    fn cbor_drafts_round_trip_through_disk() {
        let dir = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(dir.path(), DraftFormat::Cbor);
        let draft = snapshot();

        drafts.save("media", &draft).expect("save");
        let loaded = drafts.load("media").expect("load").expect("draft present");
        assert_eq!(loaded.state, draft.state);
        assert_eq!(loaded.answers, draft.answers);
        assert!(
            drafts
                .path_for("media")
                .expect("path")
                .ends_with("media.draft.cbor")
        );
    }

    #[test]
    fn missing_drafts_are_not_errors() {
        let dir = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(dir.path().join("never-created"), DraftFormat::Json);
        assert_eq!(drafts.load("media").expect("load"), None);
        assert!(drafts.list().expect("list").is_empty());
        drafts.discard("media").expect("discard");
    }

    #[test]
    fn discard_removes_the_file() {
        let dir = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(dir.path(), DraftFormat::Json);
        drafts.save("media", &snapshot()).expect("save");
        drafts.discard("media").expect("discard");
        assert!(!drafts.path_for("media").expect("path").exists());
        assert!(drafts.list().expect("list").is_empty());
    }

    #[test]
    fn corrupt_draft_surfaces_a_storage_error() {
        let dir = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(dir.path(), DraftFormat::Json);
        fs::write(drafts.path_for("media").expect("path"), "{ not json").expect("write");
        assert!(matches!(drafts.load("media"), Err(StorageError::Json(_))));
    }

    #[test]
    fn ids_that_escape_the_draft_dir_are_refused() {
        let root = TempDir::new().expect("temp dir");
        let drafts = FileDraftStore::new(root.path().join("drafts"), DraftFormat::Json);
        fs::write(root.path().join("x.draft.json"), "{}").expect("write");

        for id in ["../x", "nested/x", "..", ".hidden", ""] {
            assert!(
                matches!(drafts.discard(id), Err(StorageError::InvalidId(_))),
                "{id:?} accepted"
            );
        }
        assert!(matches!(
            drafts.save("../x", &snapshot()),
            Err(StorageError::InvalidId(_))
        ));
        assert!(matches!(drafts.load("../x"), Err(StorageError::InvalidId(_))));
        assert!(root.path().join("x.draft.json").is_file());
    }
}
