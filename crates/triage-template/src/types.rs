use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    EventPattern,
    NamespaceScope,
    StaticTarget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerCondition {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SelectorType {
    Jsonpath,
    Yq,
    Dsl,
    EventsRegex,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceSelector {
    #[serde(rename = "type")]
    pub selector_type: SelectorType,
    pub path: String,
}

impl EvidenceSelector {
    pub fn new(selector_type: SelectorType, path: impl Into<String>) -> Self {
        Self {
            selector_type,
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceContract {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub selectors: HashMap<String, Vec<EvidenceSelector>>,
    #[serde(default)]
    pub completeness_threshold: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBudgets {
    #[serde(default)]
    pub infra_steps: usize,
    #[serde(default)]
    pub workload_steps: usize,
    #[serde(default)]
    pub correlation_steps: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerConfig {
    pub window_ms: u64,
    #[serde(default = "default_max_repeat_calls")]
    pub max_repeat_calls_per_tool: usize,
}

fn default_max_repeat_calls() -> usize {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionBoundaries {
    /// Zero means "no template limit".
    #[serde(default)]
    pub max_steps: usize,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_whitelist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tool_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budgets: Option<ExecutionBudgets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Infrastructure,
    Workload,
    Correlation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Composition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub infrastructure: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub workload: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateStep {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl TemplateStep {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            params: Map::new(),
            rationale: None,
            phase: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }
}

/// A declarative diagnostic recipe for one triage target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    pub triage_target: String,
    #[serde(default)]
    pub triggers: Vec<TriggerCondition>,
    #[serde(default)]
    pub blocks: Vec<String>,
    #[serde(default)]
    pub composition: Composition,
    pub steps: Vec<TemplateStep>,
    #[serde(default)]
    pub evidence_contract: EvidenceContract,
    #[serde(default)]
    pub boundaries: ExecutionBoundaries,
}

impl DiagnosticTemplate {
    pub fn new(id: impl Into<String>, triage_target: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            version: "1.0.0".to_string(),
            triage_target: triage_target.into(),
            triggers: Vec::new(),
            blocks: Vec::new(),
            composition: Composition::default(),
            steps: Vec::new(),
            evidence_contract: EvidenceContract::default(),
            boundaries: ExecutionBoundaries::default(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_step(mut self, step: TemplateStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_block(mut self, block: impl Into<String>) -> Self {
        self.blocks.push(block.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.boundaries.max_steps = max_steps;
        self
    }

    pub fn with_evidence(
        mut self,
        key: impl Into<String>,
        selectors: Vec<EvidenceSelector>,
    ) -> Self {
        let key = key.into();
        self.evidence_contract.required.push(key.clone());
        self.evidence_contract.selectors.insert(key, selectors);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannedStep {
    pub tool: String,
    pub params: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanBoundaries {
    pub max_steps: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanResult {
    pub plan_id: String,
    pub steps: Vec<PlannedStep>,
    pub boundaries: PlanBoundaries,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanContext {
    pub session_id: String,
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_budget: Option<usize>,
}

impl PlanContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            vars: Map::new(),
            step_budget: None,
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.step_budget = Some(budget);
        self
    }
}

/// A planned step after execution. `result` is raw JSON or a JSON string
/// holding the tool's textual output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutedStep {
    pub tool: String,
    pub result: Value,
}

impl ExecutedStep {
    pub fn new(tool: impl Into<String>, result: impl Into<Value>) -> Self {
        Self {
            tool: tool.into(),
            result: result.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceReport {
    pub completeness: f64,
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateSelection {
    pub template: std::sync::Arc<DiagnosticTemplate>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_from_json() {
        let template: DiagnosticTemplate = serde_json::from_value(json!({
            "id": "ingress-pending-v1",
            "name": "Ingress pending",
            "version": "1.2.0",
            "triageTarget": "ingress-pending",
            "triggers": [{ "type": "static_target", "target": "ingress-pending" }],
            "steps": [
                { "tool": "oc_read_get_pods", "params": { "namespace": "<ns>" }, "phase": "infrastructure" }
            ],
            "evidenceContract": {
                "version": "1",
                "required": ["routerPods"],
                "selectors": { "routerPods": [{ "type": "eventsRegex", "path": "(?i)router" }] },
                "completenessThreshold": 0.8
            },
            "boundaries": {
                "maxSteps": 4,
                "timeoutMs": 20000,
                "circuitBreaker": { "windowMs": 1000 }
            }
        }))
        .unwrap();

        assert_eq!(template.triage_target, "ingress-pending");
        assert_eq!(template.steps[0].phase, Some(Phase::Infrastructure));
        assert_eq!(
            template.evidence_contract.selectors["routerPods"][0].selector_type,
            SelectorType::EventsRegex
        );
        assert_eq!(
            template
                .boundaries
                .circuit_breaker
                .unwrap()
                .max_repeat_calls_per_tool,
            1
        );
        assert_eq!(template.triggers[0].trigger_type, TriggerType::StaticTarget);
    }

    #[test]
    fn test_template_requires_steps() {
        let parsed: std::result::Result<DiagnosticTemplate, _> =
            serde_json::from_value(json!({ "id": "x", "triageTarget": "t" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_plan_serializes_camel_case() {
        let plan = PlanResult {
            plan_id: "s1".into(),
            steps: vec![],
            boundaries: PlanBoundaries {
                max_steps: 1,
                timeout_ms: 500,
            },
        };
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["planId"], "s1");
        assert_eq!(value["boundaries"]["maxSteps"], 1);
    }
}
