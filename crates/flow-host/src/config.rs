use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::HostError;

pub const DRAFT_DIR_ENV: &str = "LISTING_DRAFT_DIR";
pub const FLOWS_DIR_ENV: &str = "LISTING_FLOWS_DIR";

/// On-disk encoding for drafts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftFormat {
    #[default]
    Json,
    Cbor,
}

impl DraftFormat {
    pub fn extension(self) -> &'static str {
        match self {
            DraftFormat::Json => "json",
            DraftFormat::Cbor => "cbor",
        }
    }
}

/// Host settings; every field has a default so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub draft_dir: PathBuf,
    pub draft_format: DraftFormat,
    pub autosave: bool,
    pub flows_dir: Option<PathBuf>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            draft_dir: PathBuf::from(".listing-drafts"),
            draft_format: DraftFormat::Json,
            autosave: true,
            flows_dir: None,
        }
    }
}

impl HostConfig {
    pub fn from_json(text: &str) -> Result<Self, HostError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(HostError::ConfigParse)
    }

    /// Reads `path` when given, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, HostError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| HostError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_json(&text)?
            }
            None => Self::default(),
        };
        Ok(config.with_overrides(|key| std::env::var_os(key).map(PathBuf::from)))
    }

    /// Applies directory overrides from `lookup`, keyed by env var name.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<PathBuf>) -> Self {
        if let Some(dir) = lookup(DRAFT_DIR_ENV).filter(|dir| !dir.as_os_str().is_empty()) {
            self.draft_dir = dir;
        }
        if let Some(dir) = lookup(FLOWS_DIR_ENV).filter(|dir| !dir.as_os_str().is_empty()) {
            self.flows_dir = Some(dir);
        }
        self
    }
}
