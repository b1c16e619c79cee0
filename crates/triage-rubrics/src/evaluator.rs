use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

use crate::config::{Conditions, GuardsRubric, MappingRubric, Rubric, WeightedRubric};
use crate::expr::{ExprEvaluator, Variables, coerce_number, is_catch_all, normalize};

/// Rubrics keyed by their role: triage, confidence, safety, slo, ...
pub type RubricSet = BTreeMap<String, Rubric>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeightedRubricResult {
    pub id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub bands: Conditions,
    /// The declared inputs as supplied by the caller.
    pub inputs: BTreeMap<String, Value>,
    /// Normalized value per declared input.
    pub breakdown: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuardsRubricResult {
    pub id: String,
    pub allow_auto: bool,
    pub guards: Vec<String>,
    pub failing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingRubricResult {
    pub id: String,
    pub label: String,
    pub matched: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RubricOutcome {
    Weighted(WeightedRubricResult),
    Guards(GuardsRubricResult),
    Mapping(MappingRubricResult),
}

impl RubricOutcome {
    pub fn id(&self) -> &str {
        match self {
            RubricOutcome::Weighted(r) => &r.id,
            RubricOutcome::Guards(r) => &r.id,
            RubricOutcome::Mapping(r) => &r.id,
        }
    }

    /// Band or mapping label. Guards have none.
    pub fn label(&self) -> Option<&str> {
        match self {
            RubricOutcome::Weighted(r) => r.label.as_deref(),
            RubricOutcome::Mapping(r) => Some(&r.label),
            RubricOutcome::Guards(_) => None,
        }
    }

    pub fn allow_auto(&self) -> Option<bool> {
        match self {
            RubricOutcome::Guards(r) => Some(r.allow_auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct RubricResults(BTreeMap<String, RubricOutcome>);

impl RubricResults {
    pub fn get(&self, key: &str) -> Option<&RubricOutcome> {
        self.0.get(key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(RubricOutcome::label)
    }

    pub fn allow_auto(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(RubricOutcome::allow_auto)
    }

    pub fn insert(&mut self, key: impl Into<String>, outcome: RubricOutcome) {
        self.0.insert(key.into(), outcome);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RubricOutcome)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, RubricOutcome> {
        self.0
    }
}

/// A bare leading operator (`>=0.8`) is shorthand for `score >=0.8`.
fn band_condition(raw: &str) -> String {
    let trimmed = raw.trim();
    let starts_with_op = [">=", "<=", "==", "!=", ">", "<"]
        .iter()
        .any(|op| trimmed.starts_with(op));
    if starts_with_op {
        format!("score {}", trimmed)
    } else {
        trimmed.to_string()
    }
}

pub fn evaluate_weighted<V: Variables + ?Sized>(
    rubric: &WeightedRubric,
    inputs: &V,
) -> WeightedRubricResult {
    let mut breakdown = BTreeMap::new();
    let mut picked = BTreeMap::new();
    let mut score = 0.0;

    for key in &rubric.inputs {
        let supplied = inputs.lookup(key);
        if let Some(value) = supplied {
            picked.insert(key.clone(), value.clone());
        }
        let raw = supplied.map(|v| coerce_number(Some(v))).unwrap_or(0.0);
        let value = normalize(raw, rubric.normalize_spec(key));
        breakdown.insert(key.clone(), value);
        score += rubric.weights.get(key).copied().unwrap_or(0.0) * value;
    }

    let evaluator = ExprEvaluator::new();
    let mut context = Map::new();
    context.insert("score".to_string(), Value::from(score));

    let label = rubric.bands.iter().find_map(|(band, raw)| {
        let condition = band_condition(raw);
        if is_catch_all(&condition) {
            return Some(band.to_string());
        }
        // A NaN score has no JSON form and satisfies no threshold.
        if !score.is_finite() {
            return None;
        }
        match evaluator.evaluate(&condition, &context) {
            Ok(true) => Some(band.to_string()),
            Ok(false) => None,
            Err(err) => {
                debug!(rubric = %rubric.id, band, error = %err, "Band condition failed to evaluate");
                None
            }
        }
    });

    WeightedRubricResult {
        id: rubric.id.clone(),
        score,
        label,
        bands: rubric.bands.clone(),
        inputs: picked,
        breakdown,
    }
}

pub fn evaluate_guards<V: Variables + ?Sized>(
    rubric: &GuardsRubric,
    inputs: &V,
) -> GuardsRubricResult {
    let evaluator = ExprEvaluator::new();
    let failing: Vec<String> = rubric
        .guards
        .iter()
        .filter(|guard| match evaluator.evaluate(guard, inputs) {
            Ok(passed) => !passed,
            Err(err) => {
                debug!(rubric = %rubric.id, guard = %guard, error = %err, "Guard failed to evaluate");
                true
            }
        })
        .cloned()
        .collect();

    GuardsRubricResult {
        id: rubric.id.clone(),
        allow_auto: failing.is_empty(),
        guards: rubric.guards.clone(),
        failing,
    }
}

pub fn evaluate_mapping<V: Variables + ?Sized>(
    rubric: &MappingRubric,
    inputs: &V,
) -> MappingRubricResult {
    let evaluator = ExprEvaluator::new();
    for (label, condition) in rubric.mapping.iter() {
        match evaluator.evaluate(condition, inputs) {
            Ok(true) => {
                return MappingRubricResult {
                    id: rubric.id.clone(),
                    label: label.to_string(),
                    matched: condition.to_string(),
                };
            }
            Ok(false) => {}
            Err(err) => {
                debug!(rubric = %rubric.id, label, error = %err, "Mapping condition failed to evaluate");
            }
        }
    }

    MappingRubricResult {
        id: rubric.id.clone(),
        label: "Unknown".to_string(),
        matched: "n/a".to_string(),
    }
}

pub fn evaluate_rubric<V: Variables + ?Sized>(rubric: &Rubric, inputs: &V) -> RubricOutcome {
    match rubric {
        Rubric::Weighted(r) => RubricOutcome::Weighted(evaluate_weighted(r, inputs)),
        Rubric::Guards(r) => RubricOutcome::Guards(evaluate_guards(r, inputs)),
        Rubric::Mapping(r) => RubricOutcome::Mapping(evaluate_mapping(r, inputs)),
    }
}

pub fn evaluate_rubrics<V: Variables + ?Sized>(set: &RubricSet, inputs: &V) -> RubricResults {
    let mut results = RubricResults::default();
    for (key, rubric) in set {
        results.insert(key.clone(), evaluate_rubric(rubric, inputs));
    }
    results
}
