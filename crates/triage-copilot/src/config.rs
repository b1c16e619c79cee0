use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use triage_core::{MemoryBackend, Result, TriageError};
use triage_rubrics::{RubricSet, builtin};
use triage_template::EvidenceThresholdManager;
use triage_workflow::{
    CompositeHooks, LoggingHooks, WorkflowConfig, WorkflowEngine, WorkflowHooks,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplatesConfig {
    #[serde(default = "default_templates_dir")]
    pub dir: PathBuf,
    /// Template ids still held to the legacy completeness threshold.
    #[serde(default)]
    pub legacy_ids: Vec<String>,
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
            legacy_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfig {
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_max_entries() -> usize {
    1000
}

fn default_search_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            search_limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CopilotConfig {
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Replaces the built-in rubric set when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rubrics: Option<RubricSet>,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl CopilotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: CopilotConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn with_templates_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.templates.dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates.dir.as_os_str().is_empty() {
            return Err(TriageError::Config(
                "templates.dir cannot be empty".to_string(),
            ));
        }
        if self.memory.max_entries == 0 {
            return Err(TriageError::Config(
                "memory.max_entries must be greater than 0".to_string(),
            ));
        }
        if self.memory.search_limit == 0 {
            return Err(TriageError::Config(
                "memory.search_limit must be greater than 0".to_string(),
            ));
        }
        if let Some(ref rubrics) = self.rubrics {
            for rubric in rubrics.values() {
                rubric.validate()?;
            }
        }
        self.workflow.validate()
    }

    /// Workflow settings with the memory search limit applied.
    pub fn workflow_config(&self) -> WorkflowConfig {
        let mut workflow = self.workflow.clone();
        workflow.memory_search_limit = self.memory.search_limit;
        workflow
    }

    pub fn workflow_engine(&self, memory: Option<Arc<dyn MemoryBackend>>) -> WorkflowEngine {
        WorkflowEngine::new(self.workflow_config(), memory).with_hooks(Arc::new(LoggingHooks::new()))
    }

    /// Engine that logs its decisions and also reports them to `hooks`.
    pub fn workflow_engine_with_hooks(
        &self,
        memory: Option<Arc<dyn MemoryBackend>>,
        hooks: Arc<dyn WorkflowHooks>,
    ) -> WorkflowEngine {
        let hooks = CompositeHooks::new()
            .add(Arc::new(LoggingHooks::new()))
            .add(hooks);
        WorkflowEngine::new(self.workflow_config(), memory).with_hooks(Arc::new(hooks))
    }

    pub fn rubric_set(&self) -> RubricSet {
        self.rubrics.clone().unwrap_or_else(builtin::core_set)
    }

    pub fn threshold_manager(&self) -> EvidenceThresholdManager {
        EvidenceThresholdManager::with_legacy_ids(self.templates.legacy_ids.iter().cloned())
    }
}
