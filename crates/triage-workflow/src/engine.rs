use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use triage_core::{Evidence, EvidenceType, MemoryBackend, Result, ToolCall, TriageError};

use crate::advisor::{MemoryGuidedWorkflow, WorkflowSuggestion};
use crate::config::{EnforcementLevel, WorkflowConfig};
use crate::hooks::{NoopHooks, WorkflowHooks};
use crate::panic::PanicDetector;
use crate::response::{ActiveStates, WorkflowResponse};
use crate::session::{
    Hypothesis, HypothesisOutcome, SessionHandle, SessionStore, Solution, TestedHypothesis,
    WorkflowSession,
};
use crate::state::{DiagnosticState, StateMachine, StateRules};

/// Gatekeeper for diagnostic tool calls.
pub struct WorkflowEngine {
    config: WorkflowConfig,
    machine: StateMachine,
    store: Arc<SessionStore>,
    detector: PanicDetector,
    advisor: MemoryGuidedWorkflow,
    hooks: Arc<dyn WorkflowHooks>,
}

impl WorkflowEngine {
    pub fn new(config: WorkflowConfig, memory: Option<Arc<dyn MemoryBackend>>) -> Self {
        Self {
            machine: StateMachine::new().with_overrides(&config.states),
            store: Arc::new(SessionStore::new()),
            detector: PanicDetector::new(),
            advisor: MemoryGuidedWorkflow::new(memory, config.memory_search_limit),
            hooks: Arc::new(NoopHooks),
            config,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn WorkflowHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Share a session store between engines.
    pub fn with_store(mut self, store: Arc<SessionStore>) -> Self {
        self.store = store;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn enforcement_level(&self) -> EnforcementLevel {
        self.config.enforcement_level
    }

    pub fn state_rules(&self, state: DiagnosticState) -> &StateRules {
        self.machine.rules(state)
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub async fn process_tool_request(&self, session_id: &str, call: ToolCall) -> WorkflowResponse {
        self.process_tool_request_at(session_id, call, Utc::now()).await
    }

    /// Like [`process_tool_request`](Self::process_tool_request) with an
    /// explicit clock.
    pub async fn process_tool_request_at(
        &self,
        session_id: &str,
        mut call: ToolCall,
        now: DateTime<Utc>,
    ) -> WorkflowResponse {
        let handle = self.session_handle(session_id, now).await;
        let mut session = handle.lock().await;
        let state = session.current_state;

        if self.config.enable_panic_detection {
            let signals = self.detector.detect(&session, &call, now);
            if !signals.is_empty() {
                let blocking = signals.iter().any(|s| s.severity.is_high())
                    && self.config.enforcement_level == EnforcementLevel::Blocking;
                session.panic_signals.extend(signals.iter().cloned());
                self.hooks
                    .on_panic_detected(session_id, &signals, blocking)
                    .await;
                return if blocking {
                    WorkflowResponse::panic_blocked(state, &signals)
                } else {
                    WorkflowResponse::panic_warning(state, signals)
                };
            }
        }

        let rules = self.machine.rules(state);
        if !rules.is_tool_allowed(&call.name) {
            self.hooks
                .on_tool_blocked(session_id, &call.name, state, self.config.enforcement_level)
                .await;
            return match self.config.enforcement_level {
                EnforcementLevel::Blocking => {
                    let suggestions = self.advisor.suggest_next_steps(&session, rules).await;
                    WorkflowResponse::tool_blocked(
                        state,
                        &call.name,
                        &rules.guidance_message,
                        recommended_actions(&suggestions, rules),
                    )
                }
                EnforcementLevel::Guidance => {
                    WorkflowResponse::tool_warning(state, &call.name, &rules.guidance_message)
                }
            };
        }

        call.timestamp = now;
        session.evidence.push(Evidence::from_tool_call(&call, now));
        session.last_state_change = now;
        self.hooks.on_tool_admitted(session_id, &call, state).await;
        session.tool_calls.push(call);

        let ready = self.check_readiness(&session).await;
        let suggestions = self.advisor.suggest_next_steps(&session, rules).await;

        let mut guidance = rules.guidance_message.clone();
        if let Some(first) = suggestions.first() {
            guidance.push_str("\n\n");
            guidance.push_str(&first.message);
        }
        WorkflowResponse::admitted(state, guidance, recommended_actions(&suggestions, rules), ready)
    }

    /// Move a session to one of its state's declared next states.
    pub async fn advance_state(
        &self,
        session_id: &str,
        target: DiagnosticState,
    ) -> Result<DiagnosticState> {
        self.advance_state_at(session_id, target, Utc::now()).await
    }

    pub async fn advance_state_at(
        &self,
        session_id: &str,
        target: DiagnosticState,
        now: DateTime<Utc>,
    ) -> Result<DiagnosticState> {
        let handle = self.existing(session_id)?;
        let mut session = handle.lock().await;
        let from = session.current_state;
        let rules = self.machine.rules(from);

        if !rules.can_transition_to(target) {
            return Err(TriageError::Session(format!(
                "cannot move session '{}' from {} to {}",
                session_id, from, target
            )));
        }
        if let Some(min_secs) = rules.min_time_in_state {
            let min = Duration::seconds(min_secs as i64);
            if session.time_in_state(now) < min {
                return Err(TriageError::Session(format!(
                    "session '{}' must stay in {} for at least {}s",
                    session_id, from, min_secs
                )));
            }
        }

        session.enter_state(target, now);
        info!(session = session_id, from = %from, to = %target, "State changed");
        self.hooks
            .on_state_changed(session_id, from, target, "advance_state")
            .await;
        Ok(target)
    }

    /// Append evidence gathered outside the tool gate. Returns whether the
    /// session is now ready to transition.
    pub async fn record_evidence(&self, session_id: &str, evidence: Evidence) -> Result<bool> {
        let handle = self.existing(session_id)?;
        let mut session = handle.lock().await;
        session.evidence.push(evidence);
        Ok(self.check_readiness(&session).await)
    }

    /// Register a root-cause theory, recording it as evidence.
    pub async fn add_hypothesis(&self, session_id: &str, hypothesis: Hypothesis) -> Result<bool> {
        let handle = self.existing(session_id)?;
        let mut session = handle.lock().await;

        session.evidence.push(
            Evidence::new(EvidenceType::RootCauseTheory, &hypothesis.description, "hypothesis")
                .with_data(Value::String(hypothesis.id.clone())),
        );
        for supporting in &hypothesis.supporting_evidence {
            session.evidence.push(Evidence::new(
                EvidenceType::SupportingEvidence,
                supporting,
                "hypothesis",
            ));
        }
        session.hypotheses.push(hypothesis);
        Ok(self.check_readiness(&session).await)
    }

    /// Record how a hypothesis held up. A confirmed hypothesis becomes the
    /// confirmed root cause.
    pub async fn record_hypothesis_test(
        &self,
        session_id: &str,
        hypothesis_id: &str,
        outcome: HypothesisOutcome,
        test_results: Vec<Value>,
    ) -> Result<bool> {
        let handle = self.existing(session_id)?;
        let mut session = handle.lock().await;

        let hypothesis = session
            .hypotheses
            .iter()
            .find(|h| h.id == hypothesis_id)
            .cloned()
            .ok_or_else(|| {
                TriageError::Session(format!(
                    "session '{}' has no hypothesis '{}'",
                    session_id, hypothesis_id
                ))
            })?;

        let now = Utc::now();
        session.evidence.push(
            Evidence::new(
                EvidenceType::HypothesisTestResults,
                format!("Tested hypothesis {}", hypothesis.id),
                "hypothesis_test",
            )
            .with_data(Value::Array(test_results.clone())),
        );
        if outcome == HypothesisOutcome::Confirmed {
            session.evidence.push(Evidence::new(
                EvidenceType::ConfirmedRootCause,
                &hypothesis.description,
                "hypothesis_test",
            ));
        }
        session.tested_hypotheses.push(TestedHypothesis {
            hypothesis,
            test_results,
            outcome,
            tested_at: now,
        });
        Ok(self.check_readiness(&session).await)
    }

    /// Propose a fix. Its plan and rollback steps are recorded as evidence.
    pub async fn propose_solution(&self, session_id: &str, solution: Solution) -> Result<bool> {
        let handle = self.existing(session_id)?;
        let mut session = handle.lock().await;

        session.evidence.push(Evidence::new(
            EvidenceType::SolutionPlan,
            &solution.description,
            "solution",
        ));
        if !solution.rollback_plan.is_empty() {
            session.evidence.push(
                Evidence::new(
                    EvidenceType::RollbackPlan,
                    solution.rollback_plan.join("; "),
                    "solution",
                )
                .with_data(Value::String(solution.id.clone())),
            );
        }
        session.proposed_solutions.push(solution);
        Ok(self.check_readiness(&session).await)
    }

    /// Snapshot of a session.
    pub async fn session(&self, session_id: &str) -> Option<WorkflowSession> {
        let handle = self.store.get(session_id)?;
        let session = handle.lock().await;
        Some(session.clone())
    }

    pub async fn active_states(&self) -> ActiveStates {
        let mut sessions = Vec::new();
        for handle in self.store.handles() {
            sessions.push(handle.lock().await.summary());
        }
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        ActiveStates {
            active_sessions: sessions.len(),
            sessions,
        }
    }

    async fn session_handle(&self, session_id: &str, now: DateTime<Utc>) -> SessionHandle {
        let (handle, created) = self.store.get_or_create(session_id, now);
        if created {
            debug!(session = session_id, "Created workflow session");
            self.hooks.on_session_created(session_id).await;
        }
        handle
    }

    fn existing(&self, session_id: &str) -> Result<SessionHandle> {
        self.store
            .get(session_id)
            .ok_or_else(|| TriageError::Session(format!("unknown session '{}'", session_id)))
    }

    /// Required evidence present and enough of it. Reported, never acted on.
    async fn check_readiness(&self, session: &WorkflowSession) -> bool {
        let rules = self.machine.rules(session.current_state);
        let ready = rules
            .required_evidence
            .iter()
            .all(|required| session.has_evidence(*required))
            && session.evidence_count() >= self.config.min_evidence_threshold;
        if ready {
            info!(
                session = %session.session_id,
                state = %session.current_state,
                "Session ready for state transition"
            );
            self.hooks
                .on_transition_ready(&session.session_id, session.current_state)
                .await;
        }
        ready
    }
}

fn recommended_actions(suggestions: &[WorkflowSuggestion], rules: &StateRules) -> Vec<String> {
    match suggestions.first() {
        Some(first) => first
            .recommended_actions
            .iter()
            .map(|a| a.description.clone())
            .collect(),
        None => vec![rules.guidance_message.clone()],
    }
}
