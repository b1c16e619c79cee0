//! Evidence-gated diagnostic workflow
//!
//! Every tool request passes through [`WorkflowEngine::process_tool_request`],
//! which checks the session for panic patterns, applies the current state's
//! tool rules and records admitted calls as evidence.

pub mod advisor;
mod config;
mod engine;
pub mod hooks;
pub mod panic;
mod response;
pub mod session;
pub mod state;

pub use advisor::{
    MemoryGuidedWorkflow, SuggestedAction, SuggestionPriority, SuggestionType, WorkflowSuggestion,
    suggest_tool_for_evidence,
};
pub use config::{EnforcementLevel, WorkflowConfig};
pub use engine::WorkflowEngine;
pub use hooks::{CompositeHooks, LoggingHooks, NoopHooks, WorkflowHooks};
pub use panic::{PanicDetector, PanicSeverity, PanicSignal, PanicType};
pub use response::{ActiveStates, PANIC_ACTIONS, PANIC_CAUTION, WorkflowResponse};
pub use session::{
    Hypothesis, HypothesisOutcome, SessionHandle, SessionStore, SessionSummary, Solution,
    SolutionRisk, TestedHypothesis, WorkflowSession,
};
pub use state::{DiagnosticState, StateMachine, StateRules, matches_pattern};
