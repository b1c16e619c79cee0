//! Diagnostic decision engine for cluster incident triage

mod config;
mod triage;

pub use config::{CopilotConfig, MemoryConfig, TemplatesConfig};
pub use triage::{
    EvidenceGate, EvidenceSummary, FORCED_LOW_CONFIDENCE, GuardDetail, LabelWhy, PlannedRun,
    PrioritySummary, RubricVersions, SafetySummary, SummaryCard, TriageEnvelope, TriageRequest,
    TriageRunner, apply_evidence_gate, build_summary, default_rubric_inputs,
};

pub mod error {
    pub use triage_core::{Result, TriageError};
}

pub mod types {
    pub use triage_core::{Evidence, EvidenceQuality, EvidenceType, ToolCall};
}

pub mod tools {
    pub use triage_core::ToolExecutor;
}

pub mod memory {
    pub use triage_core::{
        ConversationMemory, DeploymentEnvironment, MemoryBackend, MemorySearchResult,
        OperationalMemory,
    };
    pub use triage_memory::{InMemoryStore, MemoryStats, SIMILARITY_THRESHOLD, text_similarity};
}

pub mod rubrics {
    pub use triage_rubrics::builtin;
    pub use triage_rubrics::{
        Conditions, ExprError, ExprEvaluator, GuardDecision, GuardsRubric, GuardsRubricResult, MappingRubric,
        MappingRubricResult, Rubric, RubricOutcome, RubricRegistry, RubricResults, RubricSet,
        Variables, WeightedRubric, WeightedRubricResult, evaluate_guards, evaluate_mapping,
        evaluate_rubric, evaluate_rubrics, evaluate_weighted, is_catch_all, normalize,
    };
}

pub mod template {
    pub use triage_template::{
        BlockRegistry, BoundaryEnforcer, CircuitBreaker, DEFAULT_THRESHOLD, DiagnosticTemplate,
        EnforcerConfig, EvidenceCompletenessCalculator, EvidenceContract, EvidenceReport,
        EvidenceSelector, EvidenceThresholdManager, EvidenceValidator, ExecutedStep,
        ExecutionBoundaries, LEGACY_THRESHOLD, PlanContext, PlanResult, PlannedStep,
        ResourceDiscoverer, SelectorType, TemplateEngine, TemplateRegistry, TemplateSelection,
        TemplateStep, completeness_for_template_type, fallback_resource, replace_vars,
        resolve_placeholder, select_path,
    };
}

pub mod workflow {
    pub use triage_workflow::{
        ActiveStates, CompositeHooks, DiagnosticState, EnforcementLevel, Hypothesis,
        HypothesisOutcome, LoggingHooks, MemoryGuidedWorkflow, NoopHooks, PanicDetector,
        PanicSeverity, PanicSignal, PanicType, SessionStore, SessionSummary, Solution,
        SolutionRisk, StateMachine, StateRules, WorkflowConfig, WorkflowEngine, WorkflowHooks,
        WorkflowResponse, WorkflowSession, WorkflowSuggestion, matches_pattern,
    };
}

pub use error::{Result, TriageError};
