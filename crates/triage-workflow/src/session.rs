use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use triage_core::{Evidence, EvidenceType, ToolCall};

use crate::panic::PanicSignal;
use crate::state::DiagnosticState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hypothesis {
    pub id: String,
    pub description: String,
    pub confidence: f64,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
    #[serde(default)]
    pub test_plan: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl Hypothesis {
    pub fn new(id: impl Into<String>, description: impl Into<String>, confidence: f64) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            confidence,
            supporting_evidence: Vec::new(),
            test_plan: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_supporting_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.supporting_evidence.push(evidence.into());
        self
    }

    pub fn with_test_step(mut self, step: impl Into<String>) -> Self {
        self.test_plan.push(step.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HypothesisOutcome {
    Confirmed,
    Rejected,
    Inconclusive,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestedHypothesis {
    #[serde(flatten)]
    pub hypothesis: Hypothesis,
    #[serde(default)]
    pub test_results: Vec<Value>,
    pub outcome: HypothesisOutcome,
    pub tested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SolutionRisk {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Solution {
    pub id: String,
    pub description: String,
    pub risk: SolutionRisk,
    #[serde(default)]
    pub rollback_plan: Vec<String>,
    #[serde(default)]
    pub approval_required: bool,
    #[serde(default)]
    pub estimated_impact: String,
}

impl Solution {
    pub fn new(id: impl Into<String>, description: impl Into<String>, risk: SolutionRisk) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            risk,
            rollback_plan: Vec::new(),
            approval_required: risk != SolutionRisk::Low,
            estimated_impact: String::new(),
        }
    }

    pub fn with_rollback_step(mut self, step: impl Into<String>) -> Self {
        self.rollback_plan.push(step.into());
        self
    }

    pub fn with_estimated_impact(mut self, impact: impl Into<String>) -> Self {
        self.estimated_impact = impact.into();
        self
    }
}

/// Everything the engine knows about one troubleshooting session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSession {
    pub session_id: String,
    pub current_state: DiagnosticState,
    pub evidence: Vec<Evidence>,
    pub hypotheses: Vec<Hypothesis>,
    pub tested_hypotheses: Vec<TestedHypothesis>,
    pub proposed_solutions: Vec<Solution>,
    pub panic_signals: Vec<PanicSignal>,
    pub tool_calls: Vec<ToolCall>,
    pub start_time: DateTime<Utc>,
    /// Last admitted call or state change.
    pub last_state_change: DateTime<Utc>,
    /// When `current_state` was entered.
    pub state_entered_at: DateTime<Utc>,
}

impl WorkflowSession {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            current_state: DiagnosticState::Gathering,
            evidence: Vec::new(),
            hypotheses: Vec::new(),
            tested_hypotheses: Vec::new(),
            proposed_solutions: Vec::new(),
            panic_signals: Vec::new(),
            tool_calls: Vec::new(),
            start_time: now,
            last_state_change: now,
            state_entered_at: now,
        }
    }

    pub fn has_evidence(&self, evidence_type: EvidenceType) -> bool {
        self.evidence.iter().any(|e| e.evidence_type == evidence_type)
    }

    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }

    /// Calls recorded at or after `now - seconds`.
    pub fn recent_tool_calls(&self, now: DateTime<Utc>, seconds: i64) -> Vec<&ToolCall> {
        let cutoff = now - Duration::seconds(seconds);
        self.tool_calls
            .iter()
            .filter(|call| call.timestamp >= cutoff)
            .collect()
    }

    pub fn time_in_state(&self, now: DateTime<Utc>) -> Duration {
        now - self.state_entered_at
    }

    pub(crate) fn enter_state(&mut self, state: DiagnosticState, now: DateTime<Utc>) {
        self.current_state = state;
        self.state_entered_at = now;
        self.last_state_change = now;
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            current_state: self.current_state,
            evidence_count: self.evidence.len(),
            last_activity: self.last_state_change,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub current_state: DiagnosticState,
    pub evidence_count: usize,
    pub last_activity: DateTime<Utc>,
}

pub type SessionHandle = Arc<Mutex<WorkflowSession>>;

/// Shared session map. Each session has its own lock so calls for
/// different sessions never wait on each other.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    /// Returns the handle and whether it was just created.
    pub fn get_or_create(&self, session_id: &str, now: DateTime<Utc>) -> (SessionHandle, bool) {
        if let Some(existing) = self.get(session_id) {
            return (existing, false);
        }
        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(session_id) {
            return (existing.clone(), false);
        }
        let handle = Arc::new(Mutex::new(WorkflowSession::new(session_id, now)));
        sessions.insert(session_id.to_string(), handle.clone());
        (handle, true)
    }

    pub fn remove(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.write().remove(session_id)
    }

    pub fn handles(&self) -> Vec<SessionHandle> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_session_starts_gathering() {
        let now = Utc::now();
        let session = WorkflowSession::new("s1", now);
        assert_eq!(session.current_state, DiagnosticState::Gathering);
        assert_eq!(session.start_time, now);
        assert_eq!(session.evidence_count(), 0);
    }

    #[test]
    fn test_recent_tool_calls_window() {
        let t0 = Utc::now();
        let mut session = WorkflowSession::new("s1", t0);
        session
            .tool_calls
            .push(ToolCall::new("old", json!({})).at(t0 - Duration::seconds(45)));
        session
            .tool_calls
            .push(ToolCall::new("edge", json!({})).at(t0 - Duration::seconds(30)));
        session.tool_calls.push(ToolCall::new("new", json!({})).at(t0));

        let names: Vec<&str> = session
            .recent_tool_calls(t0, 30)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, vec!["edge", "new"]);
        assert_eq!(session.recent_tool_calls(t0, 60).len(), 3);
    }

    #[test]
    fn test_tested_hypothesis_flattens() {
        let tested = TestedHypothesis {
            hypothesis: Hypothesis::new("h1", "node pressure", 0.6),
            test_results: vec![json!({ "memory": "92%" })],
            outcome: HypothesisOutcome::Confirmed,
            tested_at: Utc::now(),
        };
        let value = serde_json::to_value(&tested).unwrap();
        assert_eq!(value["id"], "h1");
        assert_eq!(value["outcome"], "confirmed");
        assert!(value.get("testedAt").is_some());
    }

    #[test]
    fn test_store_get_or_create() {
        let store = SessionStore::new();
        let now = Utc::now();
        let (first, created) = store.get_or_create("a", now);
        assert!(created);
        let (second, created) = store.get_or_create("a", now);
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
        assert!(store.get("b").is_none());
        assert!(store.remove("a").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_solution_approval_follows_risk() {
        assert!(!Solution::new("s", "bump limits", SolutionRisk::Low).approval_required);
        assert!(Solution::new("s", "drain node", SolutionRisk::High).approval_required);
    }
}
