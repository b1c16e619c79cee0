use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use triage_core::{Result, TriageError};

use crate::state::{DiagnosticState, StateRules};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementLevel {
    /// Inadmissible calls produce a warning.
    Guidance,
    /// Inadmissible calls are rejected.
    #[default]
    Blocking,
}

impl fmt::Display for EnforcementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementLevel::Guidance => f.write_str("guidance"),
            EnforcementLevel::Blocking => f.write_str("blocking"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowConfig {
    #[serde(default = "default_true")]
    pub enable_panic_detection: bool,
    #[serde(default)]
    pub enforcement_level: EnforcementLevel,
    #[serde(default = "default_min_evidence")]
    pub min_evidence_threshold: usize,
    #[serde(default = "default_search_limit")]
    pub memory_search_limit: usize,
    /// Per-state replacements for the built-in rule table.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub states: HashMap<DiagnosticState, StateRules>,
}

fn default_true() -> bool {
    true
}

fn default_min_evidence() -> usize {
    3
}

fn default_search_limit() -> usize {
    5
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enable_panic_detection: true,
            enforcement_level: EnforcementLevel::default(),
            min_evidence_threshold: default_min_evidence(),
            memory_search_limit: default_search_limit(),
            states: HashMap::new(),
        }
    }
}

impl WorkflowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WorkflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_enforcement(mut self, level: EnforcementLevel) -> Self {
        self.enforcement_level = level;
        self
    }

    pub fn with_min_evidence_threshold(mut self, threshold: usize) -> Self {
        self.min_evidence_threshold = threshold;
        self
    }

    pub fn with_panic_detection(mut self, enabled: bool) -> Self {
        self.enable_panic_detection = enabled;
        self
    }

    pub fn with_state_rules(mut self, state: DiagnosticState, rules: StateRules) -> Self {
        self.states.insert(state, rules);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.memory_search_limit == 0 {
            return Err(TriageError::Config(
                "memory_search_limit must be at least 1".into(),
            ));
        }
        for (state, rules) in &self.states {
            if rules.guidance_message.trim().is_empty() {
                return Err(TriageError::Config(format!(
                    "state '{}' is missing a guidance message",
                    state
                )));
            }
            if rules.next_states.is_empty() {
                return Err(TriageError::Config(format!(
                    "state '{}' has no next states",
                    state
                )));
            }
        }
        Ok(())
    }
}
