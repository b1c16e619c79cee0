//! Rubric evaluation for triage, safety and confidence decisions

pub mod builtin;
mod config;
mod evaluator;
mod expr;
mod registry;

pub use config::{Conditions, GuardDecision, GuardsRubric, MappingRubric, Rubric, WeightedRubric};
pub use evaluator::{
    GuardsRubricResult, MappingRubricResult, RubricOutcome, RubricResults, RubricSet,
    WeightedRubricResult, evaluate_guards, evaluate_mapping, evaluate_rubric, evaluate_rubrics,
    evaluate_weighted,
};
pub use expr::{ExprError, ExprEvaluator, Variables, is_catch_all, normalize};
pub use registry::RubricRegistry;
