use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use triage_core::ToolCall;

use crate::config::EnforcementLevel;
use crate::panic::PanicSignal;
use crate::state::DiagnosticState;

/// Observer of workflow decisions. Every method defaults to a no-op.
#[async_trait]
pub trait WorkflowHooks: Send + Sync {
    async fn on_session_created(&self, _session_id: &str) {}

    async fn on_panic_detected(&self, _session_id: &str, _signals: &[PanicSignal], _blocked: bool) {}

    async fn on_tool_blocked(
        &self,
        _session_id: &str,
        _tool: &str,
        _state: DiagnosticState,
        _enforcement: EnforcementLevel,
    ) {
    }

    async fn on_tool_admitted(&self, _session_id: &str, _call: &ToolCall, _state: DiagnosticState) {}

    async fn on_transition_ready(&self, _session_id: &str, _state: DiagnosticState) {}

    async fn on_state_changed(
        &self,
        _session_id: &str,
        _from: DiagnosticState,
        _to: DiagnosticState,
        _reason: &str,
    ) {
    }
}

pub struct NoopHooks;

#[async_trait]
impl WorkflowHooks for NoopHooks {}

pub struct LoggingHooks {
    prefix: String,
}

impl LoggingHooks {
    pub fn new() -> Self {
        Self {
            prefix: "[Workflow]".to_string(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowHooks for LoggingHooks {
    async fn on_session_created(&self, session_id: &str) {
        info!("{} Session {} created", self.prefix, session_id);
    }

    async fn on_panic_detected(&self, session_id: &str, signals: &[PanicSignal], blocked: bool) {
        let kinds: Vec<String> = signals
            .iter()
            .map(|s| format!("{:?}", s.signal_type))
            .collect();
        warn!(
            "{} Session {} panic signals {:?} (blocked: {})",
            self.prefix, session_id, kinds, blocked
        );
    }

    async fn on_tool_blocked(
        &self,
        session_id: &str,
        tool: &str,
        state: DiagnosticState,
        enforcement: EnforcementLevel,
    ) {
        warn!(
            "{} Session {} tool {} not allowed in {} ({})",
            self.prefix, session_id, tool, state, enforcement
        );
    }

    async fn on_tool_admitted(&self, session_id: &str, call: &ToolCall, state: DiagnosticState) {
        debug!(
            "{} Session {} admitted {} in {}",
            self.prefix, session_id, call.name, state
        );
    }

    async fn on_transition_ready(&self, session_id: &str, state: DiagnosticState) {
        info!(
            "{} Session {} ready for state transition from {}",
            self.prefix, session_id, state
        );
    }

    async fn on_state_changed(
        &self,
        session_id: &str,
        from: DiagnosticState,
        to: DiagnosticState,
        reason: &str,
    ) {
        info!(
            "{} Session {} state transition: {} -> {} ({})",
            self.prefix, session_id, from, to, reason
        );
    }
}

pub struct CompositeHooks {
    hooks: Vec<Arc<dyn WorkflowHooks>>,
}

impl CompositeHooks {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn add(mut self, hooks: Arc<dyn WorkflowHooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    pub fn with_hooks(hooks: Vec<Arc<dyn WorkflowHooks>>) -> Self {
        Self { hooks }
    }
}

impl Default for CompositeHooks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowHooks for CompositeHooks {
    async fn on_session_created(&self, session_id: &str) {
        for hook in &self.hooks {
            hook.on_session_created(session_id).await;
        }
    }

    async fn on_panic_detected(&self, session_id: &str, signals: &[PanicSignal], blocked: bool) {
        for hook in &self.hooks {
            hook.on_panic_detected(session_id, signals, blocked).await;
        }
    }

    async fn on_tool_blocked(
        &self,
        session_id: &str,
        tool: &str,
        state: DiagnosticState,
        enforcement: EnforcementLevel,
    ) {
        for hook in &self.hooks {
            hook.on_tool_blocked(session_id, tool, state, enforcement).await;
        }
    }

    async fn on_tool_admitted(&self, session_id: &str, call: &ToolCall, state: DiagnosticState) {
        for hook in &self.hooks {
            hook.on_tool_admitted(session_id, call, state).await;
        }
    }

    async fn on_transition_ready(&self, session_id: &str, state: DiagnosticState) {
        for hook in &self.hooks {
            hook.on_transition_ready(session_id, state).await;
        }
    }

    async fn on_state_changed(
        &self,
        session_id: &str,
        from: DiagnosticState,
        to: DiagnosticState,
        reason: &str,
    ) {
        for hook in &self.hooks {
            hook.on_state_changed(session_id, from, to, reason).await;
        }
    }
}
