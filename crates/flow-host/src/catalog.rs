use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use flow_spec::{FlowSpec, QuestionGraph};

use crate::config::HostConfig;
use crate::error::HostError;

const FLOW_SUFFIX: &str = ".flow.json";

const BUILTIN_FLOWS: [(&str, &str); 4] = [
    (
        "seller-disclosure.json",
        include_str!("../flows/seller-disclosure.json"),
    ),
    (
        "financial-info.json",
        include_str!("../flows/financial-info.json"),
    ),
    (
        "title-holder-info.json",
        include_str!("../flows/title-holder-info.json"),
    ),
    (
        "additional-information.json",
        include_str!("../flows/additional-information.json"),
    ),
];

/// Compiled flows keyed by id. Every entry passed the graph checks.
#[derive(Debug, Clone, Default)]
pub struct FlowCatalog {
    flows: BTreeMap<String, Arc<QuestionGraph>>,
}

impl FlowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The listing flows shipped with the host.
    pub fn builtin() -> Result<Self, HostError> {
        let mut catalog = Self::new();
        for (name, text) in BUILTIN_FLOWS {
            catalog.insert_json(name, text)?;
        }
        Ok(catalog)
    }

    /// Built-in flows plus any definitions found in `config.flows_dir`.
    pub fn from_config(config: &HostConfig) -> Result<Self, HostError> {
        let mut catalog = Self::builtin()?;
        if let Some(dir) = &config.flows_dir {
            catalog.load_dir(dir)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, spec: FlowSpec) -> Result<Arc<QuestionGraph>, HostError> {
        if self.flows.contains_key(&spec.id) {
            return Err(HostError::DuplicateFlow(spec.id));
        }
        let id = spec.id.clone();
        let graph = QuestionGraph::new(spec).map_err(|source| HostError::Configuration {
            flow: id.clone(),
            source,
        })?;
        let graph = Arc::new(graph);
        self.flows.insert(id, graph.clone());
        Ok(graph)
    }

    pub fn insert_json(&mut self, name: &str, text: &str) -> Result<Arc<QuestionGraph>, HostError> {
        let spec: FlowSpec = serde_json::from_str(text).map_err(|source| HostError::FlowParse {
            name: name.to_string(),
            source,
        })?;
        self.insert(spec)
    }

    /// Adds every `*.flow.json` in `dir`, in file name order. Returns how many were added.
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, HostError> {
        let read_err = |source| HostError::Read {
            path: dir.to_path_buf(),
            source,
        };
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            let is_flow = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(FLOW_SUFFIX));
            if is_flow && path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            let text = fs::read_to_string(path).map_err(|source| HostError::Read {
                path: path.clone(),
                source,
            })?;
            let graph = self.insert_json(&path.display().to_string(), &text)?;
            tracing::debug!(flow = %graph.id(), path = %path.display(), "loaded flow definition");
        }
        Ok(paths.len())
    }

    pub fn get(&self, id: &str) -> Result<Arc<QuestionGraph>, HostError> {
        self.flows
            .get(id)
            .cloned()
            .ok_or_else(|| HostError::FlowUnavailable(id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.flows.keys().map(String::as_str)
    }

    pub fn flows(&self) -> impl Iterator<Item = &Arc<QuestionGraph>> {
        self.flows.values()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
