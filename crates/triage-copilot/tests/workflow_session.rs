use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};

use triage_copilot::CopilotConfig;
use triage_copilot::memory::{InMemoryStore, MemoryBackend, OperationalMemory};
use triage_copilot::types::{Evidence, EvidenceType, ToolCall};
use triage_copilot::workflow::{
    DiagnosticState, EnforcementLevel, Hypothesis, HypothesisOutcome, PanicSignal, PanicType,
    Solution, SolutionRisk, WorkflowHooks,
};

async fn seeded_memory() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new(100));
    store
        .store_operational(
            OperationalMemory::new(
                "INC-4411",
                vec!["Evidence from oc_get_events".into(), "pods pending".into()],
            )
            .with_resolution("Raise the payments namespace cpu quota"),
        )
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_investigation_walks_the_state_machine() {
    let memory = seeded_memory().await;
    let engine = CopilotConfig::new().workflow_engine(Some(memory as Arc<dyn MemoryBackend>));
    let t0 = Utc::now();

    let response = engine
        .process_tool_request_at(
            "inc-1",
            ToolCall::new("oc_get_events", json!({ "namespace": "payments" })),
            t0,
        )
        .await;
    assert!(response.is_admitted());
    assert_eq!(response.current_state, Some(DiagnosticState::Gathering));
    let guidance = response.workflow_guidance.unwrap_or_default();
    assert!(guidance.contains("I found 1 similar incidents."));

    engine
        .record_evidence(
            "inc-1",
            Evidence::new(
                EvidenceType::AffectedResources,
                "api deployment in payments",
                "oc_get_pods",
            ),
        )
        .await
        .unwrap();

    // Required evidence is present, but the dwell time has not elapsed.
    assert!(
        engine
            .advance_state_at("inc-1", DiagnosticState::Analyzing, t0)
            .await
            .is_err()
    );
    engine
        .advance_state_at("inc-1", DiagnosticState::Analyzing, t0 + Duration::seconds(31))
        .await
        .unwrap();

    let hypothesis = Hypothesis::new("h1", "namespace cpu quota exhausted", 0.7)
        .with_supporting_evidence("FailedScheduling: insufficient cpu");
    engine.add_hypothesis("inc-1", hypothesis).await.unwrap();
    engine
        .record_hypothesis_test(
            "inc-1",
            "h1",
            HypothesisOutcome::Confirmed,
            vec![json!({ "quotaUsed": "100%" })],
        )
        .await
        .unwrap();
    engine
        .propose_solution(
            "inc-1",
            Solution::new("s1", "raise the quota", SolutionRisk::Medium)
                .with_rollback_step("restore the previous quota"),
        )
        .await
        .unwrap();

    let session = engine.session("inc-1").await.unwrap();
    assert_eq!(session.current_state, DiagnosticState::Analyzing);
    assert!(session.has_evidence(EvidenceType::ConfirmedRootCause));
    assert!(session.has_evidence(EvidenceType::RollbackPlan));
    assert!(session.proposed_solutions[0].approval_required);

    let active = engine.active_states().await;
    assert_eq!(active.active_sessions, 1);
}

#[tokio::test]
async fn test_write_tool_before_evidence_is_a_panic_bypass() {
    let engine = CopilotConfig::new().workflow_engine(None);

    let response = engine
        .process_tool_request(
            "inc-2",
            ToolCall::new("oc_apply_config", json!({ "name": "router" })),
        )
        .await;
    assert!(response.blocked);
    assert!(response.panic_detected);
    assert_eq!(
        response.forced_state_transition,
        Some(DiagnosticState::Analyzing)
    );

    let session = engine.session("inc-2").await.unwrap();
    assert!(session.tool_calls.is_empty());
    assert!(
        session
            .panic_signals
            .iter()
            .any(|s| s.signal_type == PanicType::BypassingDiagnostics)
    );
}

#[tokio::test]
async fn test_guidance_mode_warns_instead_of_blocking() {
    let yaml = "workflow:\n  enforcement_level: guidance\n  enable_panic_detection: false\n";
    let config = CopilotConfig::from_yaml(yaml).unwrap();
    let engine = config.workflow_engine(None);
    assert_eq!(engine.enforcement_level(), EnforcementLevel::Guidance);

    let response = engine
        .process_tool_request("inc-3", ToolCall::new("oc_scale_deployment", json!({})))
        .await;
    assert!(!response.blocked);
    assert!(response.warning);
    assert!(
        response
            .caution_message
            .unwrap_or_default()
            .contains("Consider if 'oc_scale_deployment' is appropriate for gathering state.")
    );
}

/// Keeps every hook invocation as a short line.
#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl EventLog {
    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowHooks for EventLog {
    async fn on_session_created(&self, session_id: &str) {
        self.push(format!("created {}", session_id));
    }

    async fn on_tool_admitted(&self, _session_id: &str, call: &ToolCall, state: DiagnosticState) {
        self.push(format!("admitted {} in {}", call.name, state));
    }

    async fn on_panic_detected(&self, _session_id: &str, signals: &[PanicSignal], blocked: bool) {
        self.push(format!("panic x{} blocked={}", signals.len(), blocked));
    }
}

#[tokio::test]
async fn test_caller_hooks_observe_the_logged_engine() {
    let log = Arc::new(EventLog::default());
    let engine = CopilotConfig::new().workflow_engine_with_hooks(None, log.clone());

    engine
        .process_tool_request("inc-9", ToolCall::new("oc_get_pods", json!({})))
        .await;
    let response = engine
        .process_tool_request("inc-9", ToolCall::new("oc_restart_deployment", json!({})))
        .await;
    assert!(response.blocked && response.panic_detected);

    assert_eq!(
        log.events(),
        vec![
            "created inc-9".to_string(),
            "admitted oc_get_pods in gathering".to_string(),
            "panic x1 blocked=true".to_string(),
        ]
    );
}
