//! Diagnostic templates: loading, bounded plans and evidence completeness

mod blocks;
mod boundary;
mod engine;
mod placeholder;
mod registry;
mod scoring;
mod selector;
mod threshold;
pub mod types;

pub use blocks::{BlockDefinition, BlockGroup, BlockRegistry, BlockVars};
pub use boundary::{BoundaryEnforcer, CircuitBreaker, EnforcerConfig};
pub use engine::TemplateEngine;
pub use placeholder::{ResourceDiscoverer, fallback_resource, replace_vars, resolve_placeholder};
pub use registry::TemplateRegistry;
pub use scoring::{
    EvidenceCompletenessCalculator, EvidenceValidator, TypedCompleteness, ValidationReport,
    completeness_for_template_type, required_fields_for_template_type,
};
pub use selector::{ParsedResult, SelectorInput, select_path};
pub use threshold::{DEFAULT_THRESHOLD, EvidenceThresholdManager, LEGACY_THRESHOLD};
pub use types::{
    CircuitBreakerConfig, Composition, DiagnosticTemplate, EvidenceContract, EvidenceReport,
    EvidenceSelector, ExecutedStep, ExecutionBoundaries, ExecutionBudgets, Phase, PlanBoundaries,
    PlanContext, PlanResult, PlannedStep, SelectorType, TemplateSelection, TemplateStep,
    TriggerCondition, TriggerType,
};
