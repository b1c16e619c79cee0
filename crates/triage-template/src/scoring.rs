//! Evidence completeness over a keyed evidence map

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::EvidenceContract;

/// Required fields for a template family when no contract is available.
pub fn required_fields_for_template_type(template_type: &str) -> Vec<&'static str> {
    let t = template_type.to_lowercase();
    if t.contains("ingress") {
        vec!["routerPods", "schedulingEvents", "controllerStatus"]
    } else if t.contains("cluster-health") {
        vec!["nodesSummary", "podSummary", "controlPlaneAlerts", "fanoutHint"]
    } else if t.contains("pvc") {
        vec!["pvcEvents", "storageClass", "topologyHints"]
    } else {
        Vec::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypedCompleteness {
    pub score: f64,
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

/// Score `evidence` against the required fields of a template family.
/// Fields are present when truthy; arrays must be non-empty.
pub fn completeness_for_template_type(
    evidence: &Map<String, Value>,
    template_type: &str,
) -> TypedCompleteness {
    let required = required_fields_for_template_type(template_type);
    let (present, missing): (Vec<String>, Vec<String>) = required
        .iter()
        .map(|f| f.to_string())
        .partition(|field| evidence.get(field).map(is_truthy).unwrap_or(false));

    let score = if required.is_empty() {
        1.0
    } else {
        present.len() as f64 / required.len() as f64
    };
    TypedCompleteness {
        score,
        missing,
        present,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

pub struct EvidenceCompletenessCalculator;

impl EvidenceCompletenessCalculator {
    /// Fraction of `required` dot-paths holding a complete value, rounded
    /// to two decimals. Null, blank strings and empty arrays are incomplete.
    pub fn calculate(evidence: &Value, required: &[String]) -> f64 {
        if required.is_empty() {
            return 1.0;
        }
        let completed = required
            .iter()
            .filter(|path| {
                Self::field_value(evidence, path)
                    .map(Self::is_complete)
                    .unwrap_or(false)
            })
            .count();
        let score = completed as f64 / required.len() as f64;
        (score * 100.0).round() / 100.0
    }

    fn field_value<'a>(evidence: &'a Value, path: &str) -> Option<&'a Value> {
        if path.is_empty() {
            return None;
        }
        path.split('.').try_fold(evidence, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
    }

    fn is_complete(value: &Value) -> bool {
        match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub completeness: f64,
    pub missing: Vec<String>,
}

/// Key-presence check of an evidence map against a contract.
pub struct EvidenceValidator<'a> {
    contract: &'a EvidenceContract,
}

impl<'a> EvidenceValidator<'a> {
    pub fn new(contract: &'a EvidenceContract) -> Self {
        Self { contract }
    }

    pub fn validate(&self, evidence: &Map<String, Value>) -> ValidationReport {
        let required = &self.contract.required;
        let missing: Vec<String> = required
            .iter()
            .filter(|key| {
                !match evidence.get(key.as_str()) {
                    None | Some(Value::Null) => false,
                    Some(Value::Array(items)) => !items.is_empty(),
                    Some(Value::String(s)) => !s.is_empty(),
                    Some(_) => true,
                }
            })
            .cloned()
            .collect();

        let completeness = if required.is_empty() {
            1.0
        } else {
            (required.len() - missing.len()) as f64 / required.len() as f64
        };
        ValidationReport {
            completeness,
            missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_by_type() {
        assert_eq!(
            required_fields_for_template_type("Ingress-Pending"),
            vec!["routerPods", "schedulingEvents", "controllerStatus"]
        );
        assert_eq!(required_fields_for_template_type("cluster-health").len(), 4);
        assert_eq!(required_fields_for_template_type("pvc-binding")[0], "pvcEvents");
        assert!(required_fields_for_template_type("dns").is_empty());
    }

    #[test]
    fn test_completeness_for_template_type() {
        let evidence = json!({ "routerPods": ["r1"], "schedulingEvents": [], "controllerStatus": "Available" });
        let result = completeness_for_template_type(evidence.as_object().unwrap(), "ingress");
        assert!((result.score - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.missing, vec!["schedulingEvents".to_string()]);
    }

    #[test]
    fn test_calculator_dot_paths_and_rounding() {
        let evidence = json!({
            "nodes": { "ready": 3, "names": [] },
            "alerts": "  ",
            "summary": "ok"
        });
        let required: Vec<String> = ["nodes.ready", "nodes.names", "alerts"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(EvidenceCompletenessCalculator::calculate(&evidence, &required), 0.33);

        let all = vec!["summary".to_string(), "nodes.ready".to_string()];
        assert_eq!(EvidenceCompletenessCalculator::calculate(&evidence, &all), 1.0);
        assert_eq!(EvidenceCompletenessCalculator::calculate(&evidence, &[]), 1.0);
    }

    #[test]
    fn test_validator() {
        let contract = EvidenceContract {
            required: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            ..Default::default()
        };
        let evidence = json!({ "a": 0, "b": "", "c": [1], "d": null });
        let report = EvidenceValidator::new(&contract).validate(evidence.as_object().unwrap());
        assert_eq!(report.missing, vec!["b".to_string(), "d".to_string()]);
        assert_eq!(report.completeness, 0.5);
    }
}
