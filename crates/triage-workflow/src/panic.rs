//! Detection of hurried, risky troubleshooting patterns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use triage_core::ToolCall;

use crate::session::WorkflowSession;
use crate::state::DiagnosticState;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PanicType {
    RapidFireCommands,
    JumpingBetweenDomains,
    BypassingDiagnostics,
    EscalatingPermissions,
    DestructiveWithoutEvidence,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PanicSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PanicSeverity {
    pub fn is_high(&self) -> bool {
        *self >= PanicSeverity::High
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PanicSignal {
    #[serde(rename = "type")]
    pub signal_type: PanicType,
    pub severity: PanicSeverity,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    #[serde(default)]
    pub evidence: Value,
}

const RAPID_FIRE_WINDOW_SECS: i64 = 30;
const RAPID_FIRE_EVIDENCE_SECS: i64 = 60;
const RAPID_FIRE_MIN_CALLS: usize = 2;
const BYPASS_MIN_EVIDENCE: usize = 3;

const DANGEROUS_MARKERS: &[&str] = &["apply", "delete", "restart", "scale"];
const WRITE_MARKERS: &[&str] = &["apply", "scale", "restart"];

fn contains_any(name: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| name.contains(m))
}

/// Inspects a session snapshot plus the incoming call. Holds no state.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanicDetector;

impl PanicDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn detect(
        &self,
        session: &WorkflowSession,
        call: &ToolCall,
        now: DateTime<Utc>,
    ) -> Vec<PanicSignal> {
        let mut signals = Vec::new();

        if self.is_rapid_fire(session, now) {
            let recent = session.recent_tool_calls(now, RAPID_FIRE_EVIDENCE_SECS);
            signals.push(PanicSignal {
                signal_type: PanicType::RapidFireCommands,
                severity: PanicSeverity::High,
                timestamp: now,
                description: "Multiple high-risk operations requested in quick succession".into(),
                evidence: serde_json::to_value(recent).unwrap_or_default(),
            });
        }

        if self.is_bypassing_diagnostics(session, call) {
            signals.push(PanicSignal {
                signal_type: PanicType::BypassingDiagnostics,
                severity: PanicSeverity::Critical,
                timestamp: now,
                description: "Attempting write operations without completing evidence gathering"
                    .into(),
                evidence: json!({
                    "currentState": session.current_state,
                    "requestedTool": call.name,
                }),
            });
        }

        signals
    }

    /// Counts recorded calls only, the incoming one is not part of the window.
    fn is_rapid_fire(&self, session: &WorkflowSession, now: DateTime<Utc>) -> bool {
        session
            .recent_tool_calls(now, RAPID_FIRE_WINDOW_SECS)
            .iter()
            .filter(|call| contains_any(&call.name, DANGEROUS_MARKERS))
            .count()
            >= RAPID_FIRE_MIN_CALLS
    }

    fn is_bypassing_diagnostics(&self, session: &WorkflowSession, call: &ToolCall) -> bool {
        let early_state = matches!(
            session.current_state,
            DiagnosticState::Gathering | DiagnosticState::Analyzing
        );
        contains_any(&call.name, WRITE_MARKERS)
            && (session.evidence_count() < BYPASS_MIN_EVIDENCE || early_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use triage_core::Evidence;

    fn resolving_session(now: DateTime<Utc>, evidence: usize) -> WorkflowSession {
        let mut session = WorkflowSession::new("s", now);
        session.current_state = DiagnosticState::Resolving;
        for i in 0..evidence {
            let call = ToolCall::new(format!("oc_get_{}", i), json!({}));
            session.evidence.push(Evidence::from_tool_call(&call, now));
        }
        session
    }

    #[test]
    fn test_rapid_fire_detected() {
        let t0 = Utc::now();
        let mut session = resolving_session(t0, 5);
        session
            .tool_calls
            .push(ToolCall::new("oc_apply_config", json!({})).at(t0));
        session
            .tool_calls
            .push(ToolCall::new("oc_scale_deployment", json!({})).at(t0 + Duration::seconds(5)));

        let now = t0 + Duration::seconds(10);
        let signals = PanicDetector::default().detect(
            &session,
            &ToolCall::new("memory_store_operational", json!({})),
            now,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, PanicType::RapidFireCommands);
        assert_eq!(signals[0].severity, PanicSeverity::High);
        assert_eq!(signals[0].evidence.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rapid_fire_outside_window() {
        let t0 = Utc::now();
        let mut session = resolving_session(t0, 5);
        session
            .tool_calls
            .push(ToolCall::new("oc_apply_config", json!({})).at(t0));
        session
            .tool_calls
            .push(ToolCall::new("oc_scale_deployment", json!({})).at(t0 + Duration::seconds(5)));

        let now = t0 + Duration::seconds(31);
        let signals = PanicDetector::default().detect(
            &session,
            &ToolCall::new("oc_get_pods", json!({})),
            now,
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn test_bypassing_diagnostics_in_gathering() {
        let now = Utc::now();
        let mut session = WorkflowSession::new("s", now);
        let call = ToolCall::new("oc_get_pods", json!({}));
        session.evidence.push(Evidence::from_tool_call(&call, now));

        let signals = PanicDetector::default().detect(
            &session,
            &ToolCall::new("oc_apply_config", json!({})),
            now,
        );
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].signal_type, PanicType::BypassingDiagnostics);
        assert_eq!(signals[0].severity, PanicSeverity::Critical);
        assert_eq!(signals[0].evidence["currentState"], "gathering");
        assert_eq!(signals[0].evidence["requestedTool"], "oc_apply_config");
    }

    #[test]
    fn test_write_allowed_late_with_enough_evidence() {
        let now = Utc::now();
        let session = resolving_session(now, 3);
        let signals = PanicDetector::default().detect(
            &session,
            &ToolCall::new("oc_restart_deployment", json!({})),
            now,
        );
        assert!(signals.is_empty());

        let thin = resolving_session(now, 2);
        assert_eq!(
            PanicDetector::default()
                .detect(&thin, &ToolCall::new("oc_restart_deployment", json!({})), now)
                .len(),
            1
        );
    }

    #[test]
    fn test_write_evidence_minimum_is_fixed_at_three() {
        let now = Utc::now();
        let detector = PanicDetector::new();
        let restart = ToolCall::new("oc_restart_deployment", json!({}));

        assert!(detector.detect(&resolving_session(now, 3), &restart, now).is_empty());
        let signals = detector.detect(&resolving_session(now, 2), &restart, now);
        assert_eq!(signals[0].evidence["currentState"], "resolving");
    }

    #[test]
    fn test_delete_is_dangerous_but_not_a_write() {
        let now = Utc::now();
        let session = WorkflowSession::new("s", now);
        let signals = PanicDetector::default().detect(
            &session,
            &ToolCall::new("oc_delete_pod", json!({})),
            now,
        );
        assert!(signals.is_empty());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(PanicSeverity::Critical.is_high());
        assert!(PanicSeverity::High.is_high());
        assert!(!PanicSeverity::Medium.is_high());
    }
}
