use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use triage_core::EvidenceType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticState {
    #[default]
    Gathering,
    Analyzing,
    Hypothesizing,
    Testing,
    Resolving,
}

impl DiagnosticState {
    pub const ALL: [DiagnosticState; 5] = [
        DiagnosticState::Gathering,
        DiagnosticState::Analyzing,
        DiagnosticState::Hypothesizing,
        DiagnosticState::Testing,
        DiagnosticState::Resolving,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticState::Gathering => "gathering",
            DiagnosticState::Analyzing => "analyzing",
            DiagnosticState::Hypothesizing => "hypothesizing",
            DiagnosticState::Testing => "testing",
            DiagnosticState::Resolving => "resolving",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for DiagnosticState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DiagnosticState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagnosticState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown diagnostic state '{}'", s))
    }
}

/// `pattern*` matches by prefix, anything else by equality.
pub fn matches_pattern(tool_name: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => tool_name.starts_with(prefix),
        None => tool_name == pattern,
    }
}

/// What a diagnostic state permits and expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StateRules {
    #[serde(default)]
    pub description: String,
    /// Empty means every tool not explicitly blocked is allowed.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub blocked_tools: Vec<String>,
    #[serde(default)]
    pub required_evidence: Vec<EvidenceType>,
    #[serde(default)]
    pub next_states: Vec<DiagnosticState>,
    /// Seconds the session must stay in this state before advancing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time_in_state: Option<u64>,
    pub guidance_message: String,
}

impl StateRules {
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        if self
            .blocked_tools
            .iter()
            .any(|pattern| matches_pattern(tool_name, pattern))
        {
            return false;
        }
        self.allowed_tools.is_empty()
            || self
                .allowed_tools
                .iter()
                .any(|pattern| matches_pattern(tool_name, pattern))
    }

    pub fn can_transition_to(&self, target: DiagnosticState) -> bool {
        self.next_states.contains(&target)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const WRITE_TOOLS: &[&str] = &["oc_apply_*", "oc_scale_*", "oc_restart_*"];

fn default_rules(state: DiagnosticState) -> StateRules {
    use DiagnosticState::*;
    use EvidenceType as E;

    match state {
        Gathering => StateRules {
            description: "Collecting evidence and symptoms".into(),
            allowed_tools: strings(&[
                "oc_get_pods",
                "oc_describe_pod",
                "oc_get_logs",
                "oc_get_events",
                "memory_search_operational",
            ]),
            blocked_tools: strings(WRITE_TOOLS),
            required_evidence: vec![E::Symptoms, E::AffectedResources],
            next_states: vec![Analyzing],
            min_time_in_state: Some(30),
            guidance_message: "Let's gather evidence about what's happening before making changes.".into(),
        },
        Analyzing => StateRules {
            description: "Searching for similar patterns and root causes".into(),
            allowed_tools: strings(&["memory_search_operational", "memory_search_conversations"]),
            blocked_tools: strings(WRITE_TOOLS),
            required_evidence: vec![E::SimilarIncidents, E::PatternAnalysis],
            next_states: vec![Hypothesizing, Gathering],
            min_time_in_state: None,
            guidance_message: "Based on the evidence, let's look for similar patterns we've seen before.".into(),
        },
        Hypothesizing => StateRules {
            description: "Forming testable theories about root causes".into(),
            allowed_tools: strings(&["oc_get_*", "oc_describe_*", "oc_analyze_*"]),
            blocked_tools: strings(WRITE_TOOLS),
            required_evidence: vec![E::RootCauseTheory, E::SupportingEvidence],
            next_states: vec![Testing, Analyzing],
            min_time_in_state: None,
            guidance_message: "Let's form a specific theory about what's causing this issue.".into(),
        },
        Testing => StateRules {
            description: "Testing hypotheses with targeted investigation".into(),
            allowed_tools: strings(&["oc_get_*", "oc_describe_*", "oc_logs_*", "oc_exec"]),
            blocked_tools: strings(WRITE_TOOLS),
            required_evidence: vec![E::HypothesisTestResults],
            next_states: vec![Resolving, Hypothesizing],
            min_time_in_state: None,
            guidance_message: "Let's test our theory with specific diagnostic commands.".into(),
        },
        Resolving => StateRules {
            description: "Applying approved solutions with proper authorization".into(),
            allowed_tools: strings(&[
                "oc_apply_config",
                "oc_scale_deployment",
                "oc_restart_deployment",
                "memory_store_operational",
            ]),
            blocked_tools: Vec::new(),
            required_evidence: vec![E::ConfirmedRootCause, E::SolutionPlan, E::RollbackPlan],
            next_states: vec![Gathering],
            min_time_in_state: None,
            guidance_message: "Now we can apply the fix, with proper approval and rollback plan.".into(),
        },
    }
}

/// Rule table covering every state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    rules: [StateRules; 5],
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            rules: DiagnosticState::ALL.map(default_rules),
        }
    }

    /// Replace the built-in rules for the states present in `overrides`.
    pub fn with_overrides(mut self, overrides: &HashMap<DiagnosticState, StateRules>) -> Self {
        for (state, rules) in overrides {
            self.rules[state.index()] = rules.clone();
        }
        self
    }

    pub fn rules(&self, state: DiagnosticState) -> &StateRules {
        &self.rules[state.index()]
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_pattern() {
        assert!(matches_pattern("oc_apply_config", "oc_apply_*"));
        assert!(matches_pattern("oc_apply_", "oc_apply_*"));
        assert!(!matches_pattern("oc_get_pods", "oc_apply_*"));
        assert!(matches_pattern("oc_exec", "oc_exec"));
        assert!(!matches_pattern("oc_exec_shell", "oc_exec"));
        assert!(matches_pattern("anything", "*"));
    }

    #[test]
    fn test_blocked_checked_before_allowed() {
        let rules = StateRules {
            description: String::new(),
            allowed_tools: vec!["oc_*".into()],
            blocked_tools: vec!["oc_apply_*".into()],
            required_evidence: vec![],
            next_states: vec![],
            min_time_in_state: None,
            guidance_message: "g".into(),
        };
        assert!(rules.is_tool_allowed("oc_get_pods"));
        assert!(!rules.is_tool_allowed("oc_apply_config"));
        assert!(!rules.is_tool_allowed("memory_search_operational"));
    }

    #[test]
    fn test_empty_allow_list_allows_everything_unblocked() {
        let mut rules = default_rules(DiagnosticState::Resolving);
        rules.allowed_tools.clear();
        rules.blocked_tools = vec!["oc_delete_*".into()];
        assert!(rules.is_tool_allowed("whatever"));
        assert!(!rules.is_tool_allowed("oc_delete_pod"));
    }

    #[test]
    fn test_default_table() {
        let machine = StateMachine::new();
        let gathering = machine.rules(DiagnosticState::Gathering);
        assert!(gathering.is_tool_allowed("oc_get_pods"));
        assert!(!gathering.is_tool_allowed("oc_apply_config"));
        assert!(!gathering.is_tool_allowed("oc_get_nodes"));
        assert_eq!(gathering.min_time_in_state, Some(30));

        let hypothesizing = machine.rules(DiagnosticState::Hypothesizing);
        assert!(hypothesizing.is_tool_allowed("oc_get_nodes"));

        let resolving = machine.rules(DiagnosticState::Resolving);
        assert!(resolving.is_tool_allowed("oc_apply_config"));
        assert!(resolving.blocked_tools.is_empty());
        assert_eq!(resolving.next_states, vec![DiagnosticState::Gathering]);
    }

    #[test]
    fn test_states_cycle() {
        let machine = StateMachine::new();
        let mut state = DiagnosticState::Gathering;
        for _ in 0..DiagnosticState::ALL.len() {
            state = machine.rules(state).next_states[0];
        }
        assert_eq!(state, DiagnosticState::Gathering);
    }

    #[test]
    fn test_overrides_replace_single_state() {
        let mut custom = default_rules(DiagnosticState::Analyzing);
        custom.allowed_tools = vec!["oc_*".into()];
        let overrides = HashMap::from([(DiagnosticState::Analyzing, custom.clone())]);

        let machine = StateMachine::new().with_overrides(&overrides);
        assert_eq!(machine.rules(DiagnosticState::Analyzing), &custom);
        assert_eq!(
            machine.rules(DiagnosticState::Gathering),
            &default_rules(DiagnosticState::Gathering)
        );
    }

    #[test]
    fn test_state_from_str_and_serde() {
        assert_eq!("TESTING".parse::<DiagnosticState>().unwrap(), DiagnosticState::Testing);
        assert!("done".parse::<DiagnosticState>().is_err());
        assert_eq!(
            serde_json::to_value(DiagnosticState::Hypothesizing).unwrap(),
            serde_json::json!("hypothesizing")
        );
    }
}
