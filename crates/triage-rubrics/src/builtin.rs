//! Built-in rubric set used when a deployment does not supply its own.

use crate::config::{GuardsRubric, MappingRubric, Rubric, WeightedRubric};
use crate::evaluator::RubricSet;

pub const TRIAGE_PRIORITY_V1: &str = "triage-priority.v1";
pub const EVIDENCE_CONFIDENCE_V1: &str = "evidence-confidence.v1";
pub const REMEDIATION_SAFETY_V1: &str = "remediation-safety.v1";
pub const SLO_IMPACT_V1: &str = "slo-impact.v1";

pub fn triage_priority() -> Rubric {
    WeightedRubric::new(TRIAGE_PRIORITY_V1)
        .with_input("blastRadius", 0.4)
        .with_input("customerPaths", 0.3)
        .with_input("operatorsDegraded", 0.2)
        .with_input("timeSinceFirstEventMin", 0.1)
        .with_normalize("timeSinceFirstEventMin", "clamp:0..180->0..1")
        .with_band("P1", ">=0.8")
        .with_band("P2", ">=0.55")
        .with_band("P3", ">=0.3")
        .with_band("P4", "otherwise")
        .into()
}

pub fn evidence_confidence() -> Rubric {
    MappingRubric::new(EVIDENCE_CONFIDENCE_V1)
        .with_inputs(vec![
            "evidenceCompleteness".into(),
            "toolAgreement".into(),
            "freshnessMin".into(),
        ])
        .with_label(
            "High",
            "evidenceCompleteness >= 0.9 && toolAgreement >= 0.8 && freshnessMin <= 10",
        )
        .with_label(
            "Medium",
            "evidenceCompleteness >= 0.75 && toolAgreement >= 0.6",
        )
        .with_label("Low", "otherwise")
        .into()
}

pub fn remediation_safety() -> Rubric {
    GuardsRubric::new(REMEDIATION_SAFETY_V1)
        .with_guard("etcdHealthy == true")
        .with_guard("affectedNamespaces <= 3")
        .with_guard("noCriticalAlerts == true")
        .with_decision("all guards true")
        .into()
}

pub fn slo_impact() -> Rubric {
    MappingRubric::new(SLO_IMPACT_V1)
        .with_inputs(vec!["customerPaths".into(), "blastRadius".into()])
        .with_label("Critical", "customerPaths >= 0.8 && blastRadius >= 0.7")
        .with_label("Major", "customerPaths >= 0.5 || blastRadius >= 0.7")
        .with_label("Minor", "otherwise")
        .into()
}

pub fn all() -> Vec<Rubric> {
    vec![
        triage_priority(),
        evidence_confidence(),
        remediation_safety(),
        slo_impact(),
    ]
}

/// The set evaluated for every triage run, keyed by role.
pub fn core_set() -> RubricSet {
    let mut set = RubricSet::new();
    set.insert("triage".into(), triage_priority());
    set.insert("confidence".into(), evidence_confidence());
    set.insert("safety".into(), remediation_safety());
    set.insert("slo".into(), slo_impact());
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::evaluate_rubrics;
    use serde_json::json;

    #[test]
    fn test_core_set_roles() {
        let set = core_set();
        let keys: Vec<&str> = set.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["confidence", "safety", "slo", "triage"]);
        assert_eq!(set["triage"].id(), TRIAGE_PRIORITY_V1);
    }

    #[test]
    fn test_ingress_outage_profile() {
        let inputs = json!({
            "blastRadius": 1,
            "customerPaths": 1,
            "operatorsDegraded": 0.5,
            "timeSinceFirstEventMin": 72,
            "evidenceCompleteness": 1.0,
            "toolAgreement": 0.85,
            "freshnessMin": 5,
            "etcdHealthy": true,
            "affectedNamespaces": 1,
            "noCriticalAlerts": true
        });
        let results = evaluate_rubrics(&core_set(), &inputs);

        // 0.4 + 0.3 + 0.1 + 0.1 * 0.4 = 0.84
        assert_eq!(results.label("triage"), Some("P1"));
        assert_eq!(results.label("confidence"), Some("High"));
        assert_eq!(results.allow_auto("safety"), Some(true));
        assert_eq!(results.label("slo"), Some("Critical"));
    }

    #[test]
    fn test_quiet_profile() {
        let inputs = json!({
            "blastRadius": 0.1,
            "customerPaths": 0,
            "evidenceCompleteness": 0.4,
            "affectedNamespaces": 7
        });
        let results = evaluate_rubrics(&core_set(), &inputs);
        assert_eq!(results.label("triage"), Some("P4"));
        assert_eq!(results.label("confidence"), Some("Low"));
        assert_eq!(results.allow_auto("safety"), Some(false));
        assert_eq!(results.label("slo"), Some("Minor"));
    }

    #[test]
    fn test_all_rubrics_validate() {
        for rubric in all() {
            rubric.validate().unwrap();
        }
    }
}
