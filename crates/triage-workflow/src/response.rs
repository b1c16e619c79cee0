use serde::{Deserialize, Serialize};

use crate::panic::{PanicSignal, PanicType};
use crate::session::SessionSummary;
use crate::state::DiagnosticState;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Outcome of one tool request. Blocks and warnings are ordinary values.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    #[serde(default, skip_serializing_if = "is_false")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub warning: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub panic_detected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intervention_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caution_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_guidance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<DiagnosticState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_recommended_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_state_transition: Option<DiagnosticState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panic_signals: Option<Vec<PanicSignal>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub transition_ready: bool,
}

pub const PANIC_ACTIONS: [&str; 3] = [
    "Take a deep breath - let's approach this methodically",
    "Review the evidence we've gathered so far",
    "Look for similar incidents in our memory system",
];

pub const PANIC_CAUTION: &str =
    "I notice we might be moving quickly. Let's make sure we have enough evidence.";

impl WorkflowResponse {
    pub fn admitted(
        state: DiagnosticState,
        guidance: String,
        actions: Vec<String>,
        transition_ready: bool,
    ) -> Self {
        Self {
            workflow_guidance: Some(guidance),
            current_state: Some(state),
            next_recommended_actions: Some(actions),
            transition_ready,
            ..Self::default()
        }
    }

    pub fn panic_blocked(state: DiagnosticState, signals: &[PanicSignal]) -> Self {
        Self {
            blocked: true,
            panic_detected: true,
            intervention_message: Some(calming_message(signals)),
            current_state: Some(state),
            next_recommended_actions: Some(PANIC_ACTIONS.iter().map(|s| s.to_string()).collect()),
            forced_state_transition: Some(DiagnosticState::Analyzing),
            ..Self::default()
        }
    }

    pub fn panic_warning(state: DiagnosticState, signals: Vec<PanicSignal>) -> Self {
        Self {
            warning: true,
            caution_message: Some(PANIC_CAUTION.to_string()),
            current_state: Some(state),
            panic_signals: Some(signals),
            ..Self::default()
        }
    }

    pub fn tool_blocked(
        state: DiagnosticState,
        tool: &str,
        guidance: &str,
        actions: Vec<String>,
    ) -> Self {
        Self {
            blocked: true,
            intervention_message: Some(format!(
                "Tool '{}' is not allowed in {} state. {}",
                tool, state, guidance
            )),
            current_state: Some(state),
            next_recommended_actions: Some(actions),
            ..Self::default()
        }
    }

    pub fn tool_warning(state: DiagnosticState, tool: &str, guidance: &str) -> Self {
        Self {
            warning: true,
            caution_message: Some(format!(
                "Consider if '{}' is appropriate for {} state. {}",
                tool, state, guidance
            )),
            current_state: Some(state),
            ..Self::default()
        }
    }

    /// True when the call was recorded.
    pub fn is_admitted(&self) -> bool {
        !self.blocked && !self.warning
    }
}

fn calming_message(signals: &[PanicSignal]) -> String {
    let mut lines = vec![
        "🛑 Hold on - I'm detecting concerning patterns in our troubleshooting approach.",
        "",
        "It looks like we might be:",
    ];
    for signal in signals {
        match signal.signal_type {
            PanicType::RapidFireCommands => lines.push("• Moving too quickly between operations"),
            PanicType::BypassingDiagnostics => {
                lines.push("• Trying to apply fixes before understanding the problem")
            }
            _ => {}
        }
    }
    lines.extend([
        "",
        "Let's slow down and work through this systematically.",
        "What symptoms are we seeing? Let's start there.",
    ]);
    lines.join("\n")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveStates {
    pub active_sessions: usize,
    pub sessions: Vec<SessionSummary>,
}
