//! One bounded triage run: template selection, plan, execution, evidence
//! gate and rubric summary.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use triage_core::{Result, ToolExecutor, TriageError};
use triage_rubrics::{GuardsRubricResult, RubricOutcome, RubricResults, RubricSet, builtin, evaluate_rubrics};
use triage_template::{
    BoundaryEnforcer, DiagnosticTemplate, EnforcerConfig, EvidenceThresholdManager, ExecutedStep,
    PlanContext, PlanResult, ResourceDiscoverer, TemplateEngine, TemplateRegistry,
    resolve_placeholder,
};

use crate::config::CopilotConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriageRequest {
    pub triage_target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub vars: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_budget: Option<usize>,
    /// Observed signals. These override the derived rubric inputs.
    #[serde(default)]
    pub signals: Map<String, Value>,
}

impl TriageRequest {
    pub fn new(triage_target: impl Into<String>) -> Self {
        Self {
            triage_target: triage_target.into(),
            ..Self::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.step_budget = Some(budget);
        self
    }

    pub fn with_signal(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.signals.insert(key.into(), value.into());
        self
    }
}

/// A selected template and the bounded plan built from it.
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub template: Arc<DiagnosticTemplate>,
    pub routing: String,
    pub plan: PlanResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceGate {
    pub completeness: f64,
    pub threshold: f64,
    pub pass: bool,
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardDetail {
    pub guard: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<Value>,
    pub pass: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LabelWhy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PrioritySummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SafetySummary {
    pub allow_auto: bool,
    pub why: String,
    pub guards: Vec<GuardDetail>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceSummary {
    pub completeness: f64,
    pub min_threshold: f64,
    pub missing: Vec<String>,
    pub present: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RubricVersions {
    pub triage: String,
    pub confidence: String,
    pub safety: String,
}

/// Human-facing digest of one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryCard {
    pub template_id: String,
    pub template_version: String,
    pub rubric_versions: RubricVersions,
    pub priority: PrioritySummary,
    pub confidence: LabelWhy,
    pub safety: SafetySummary,
    pub evidence: EvidenceSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo: Option<LabelWhy>,
    pub rubric_inputs: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriageEnvelope {
    pub plan_id: String,
    pub target: String,
    pub template_id: String,
    pub routing: String,
    pub steps: Vec<ExecutedStep>,
    pub evidence: EvidenceGate,
    pub rubrics: RubricResults,
    pub summary: SummaryCard,
}

impl TriageEnvelope {
    pub fn priority(&self) -> Option<&str> {
        self.summary.priority.label.as_deref()
    }

    pub fn confidence(&self) -> Option<&str> {
        self.summary.confidence.label.as_deref()
    }

    pub fn allow_auto(&self) -> bool {
        self.summary.safety.allow_auto
    }
}

pub const FORCED_LOW_CONFIDENCE: &str = "forced: evidence below threshold";

/// Baseline rubric inputs for a target before observed signals are applied.
pub fn default_rubric_inputs(target: &str, completeness: f64) -> Map<String, Value> {
    let customer_facing = target == "ingress-pending";
    let mut inputs = Map::new();
    inputs.insert("evidenceCompleteness".into(), completeness.into());
    inputs.insert("toolAgreement".into(), 0.85.into());
    inputs.insert("freshnessMin".into(), 5.into());
    inputs.insert("etcdHealthy".into(), true.into());
    inputs.insert("controlPlaneReadyRatio".into(), 0.67.into());
    inputs.insert("affectedNamespaces".into(), 1.into());
    inputs.insert("noCriticalAlerts".into(), true.into());
    inputs.insert(
        "blastRadius".into(),
        Value::from(if customer_facing { 1.0 } else { 0.7 }),
    );
    inputs.insert(
        "customerPaths".into(),
        Value::from(if customer_facing { 1.0 } else { 0.5 }),
    );
    inputs.insert("operatorsDegraded".into(), 0.5.into());
    inputs.insert("timeSinceFirstEventMin".into(), 72.into());
    inputs
}

/// Demote confidence to `Low` when the evidence gate did not pass.
pub fn apply_evidence_gate(results: &mut RubricResults) {
    let forced = match results.get("confidence") {
        Some(RubricOutcome::Mapping(mapping)) => {
            let mut mapping = mapping.clone();
            mapping.label = "Low".into();
            mapping.matched = FORCED_LOW_CONFIDENCE.into();
            RubricOutcome::Mapping(mapping)
        }
        Some(RubricOutcome::Weighted(weighted)) => {
            let mut weighted = weighted.clone();
            weighted.label = Some("Low".into());
            RubricOutcome::Weighted(weighted)
        }
        _ => return,
    };
    results.insert("confidence", forced);
}

const GUARD_PATTERN: &str =
    r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*(==|!=|>=|<=|>|<)\s*(true|false|[0-9.]+)\s*$";

fn guard_details(safety: Option<&GuardsRubricResult>, inputs: &Map<String, Value>) -> Vec<GuardDetail> {
    let Some(safety) = safety else {
        return Vec::new();
    };
    let pattern = Regex::new(GUARD_PATTERN).ok();

    safety
        .guards
        .iter()
        .map(|guard| {
            let captures = pattern.as_ref().and_then(|re| re.captures(guard));
            let part = |i: usize| {
                captures
                    .as_ref()
                    .and_then(|c| c.get(i))
                    .map(|m| m.as_str().to_string())
            };
            let key = part(1);
            let threshold = part(3).map(|raw| match raw.to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => raw
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::String(raw)),
            });
            GuardDetail {
                guard: guard.clone(),
                observed: key.as_ref().and_then(|k| inputs.get(k)).cloned(),
                key,
                op: part(2),
                threshold,
                pass: !safety.failing.contains(guard),
            }
        })
        .collect()
}

pub fn build_summary(
    template: &DiagnosticTemplate,
    rubrics: &RubricResults,
    gate: &EvidenceGate,
    inputs: &Map<String, Value>,
) -> SummaryCard {
    let mut versions = RubricVersions::default();
    let mut priority = PrioritySummary::default();
    let mut confidence = LabelWhy::default();
    let mut safety = SafetySummary {
        why: "all guards passed".into(),
        ..SafetySummary::default()
    };
    let mut slo = None;

    if let Some(RubricOutcome::Weighted(triage)) = rubrics.get("triage") {
        versions.triage = triage.id.clone();
        priority = PrioritySummary {
            label: triage.label.clone(),
            score: triage.score,
            why: triage
                .label
                .as_deref()
                .and_then(|label| triage.bands.get(label))
                .map(str::to_string),
        };
    }
    match rubrics.get("confidence") {
        Some(RubricOutcome::Mapping(m)) => {
            versions.confidence = m.id.clone();
            confidence = LabelWhy {
                label: Some(m.label.clone()),
                why: Some(m.matched.clone()),
            };
        }
        Some(RubricOutcome::Weighted(w)) => {
            versions.confidence = w.id.clone();
            confidence.label = w.label.clone();
        }
        _ => {}
    }
    let guards = match rubrics.get("safety") {
        Some(RubricOutcome::Guards(g)) => Some(g),
        _ => None,
    };
    if let Some(g) = guards {
        versions.safety = g.id.clone();
        safety.allow_auto = g.allow_auto;
        if !g.failing.is_empty() {
            safety.why = format!("failing: {}", g.failing.join("; "));
        }
    }
    safety.guards = guard_details(guards, inputs);
    if let Some(RubricOutcome::Mapping(m)) = rubrics.get("slo") {
        slo = Some(LabelWhy {
            label: Some(m.label.clone()),
            why: Some(m.matched.clone()),
        });
    }

    SummaryCard {
        template_id: template.id.clone(),
        template_version: template.version.clone(),
        rubric_versions: versions,
        priority,
        confidence,
        safety,
        evidence: EvidenceSummary {
            completeness: gate.completeness,
            min_threshold: gate.threshold,
            missing: gate.missing.clone(),
            present: gate.present.clone(),
        },
        slo,
        rubric_inputs: inputs.clone(),
    }
}

fn is_placeholder(s: &str) -> bool {
    s.len() > 2 && s.starts_with('<') && s.ends_with('>')
}

/// Runs templates end to end against a tool executor.
pub struct TriageRunner {
    templates: Arc<TemplateRegistry>,
    engine: TemplateEngine,
    thresholds: EvidenceThresholdManager,
    rubrics: RubricSet,
    discoverer: Option<Arc<dyn ResourceDiscoverer>>,
}

impl TriageRunner {
    pub fn new(templates: Arc<TemplateRegistry>) -> Self {
        Self {
            templates,
            engine: TemplateEngine::new(),
            thresholds: EvidenceThresholdManager::new(),
            rubrics: builtin::core_set(),
            discoverer: None,
        }
    }

    pub fn from_config(config: &CopilotConfig) -> Result<Self> {
        let templates = TemplateRegistry::load(config.templates.dir.clone())?;
        Ok(Self::new(Arc::new(templates))
            .with_rubrics(config.rubric_set())
            .with_thresholds(config.threshold_manager()))
    }

    pub fn with_rubrics(mut self, rubrics: RubricSet) -> Self {
        self.rubrics = rubrics;
        self
    }

    pub fn with_thresholds(mut self, thresholds: EvidenceThresholdManager) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_discoverer(mut self, discoverer: Arc<dyn ResourceDiscoverer>) -> Self {
        self.discoverer = Some(discoverer);
        self
    }

    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    fn context(&self, request: &TriageRequest) -> PlanContext {
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| format!("triage-{}", uuid::Uuid::new_v4()));
        let mut context = PlanContext::new(session_id);
        if let Some(ns) = &request.namespace {
            context.vars.insert("ns".into(), Value::String(ns.clone()));
        }
        context.vars.extend(request.vars.clone());
        context.step_budget = request.step_budget;
        context
    }

    /// Select a template, build its plan, resolve leftover placeholders and
    /// apply the template's execution boundaries.
    pub async fn plan(&self, request: &TriageRequest) -> Result<PlannedRun> {
        let selection = self
            .templates
            .select_by_target(&request.triage_target)
            .ok_or_else(|| {
                TriageError::Template(format!(
                    "no template for triage target '{}'",
                    request.triage_target
                ))
            })?;
        let template = selection.template;
        let context = self.context(request);
        let mut plan = self.engine.build_plan(&template, &context);

        for step in &mut plan.steps {
            for value in step.params.values_mut() {
                let Some(raw) = value.as_str().filter(|s| is_placeholder(s)) else {
                    continue;
                };
                let resolved =
                    resolve_placeholder(raw, &context.vars, self.discoverer.as_deref()).await;
                if !resolved.is_empty() {
                    *value = Value::String(resolved);
                }
            }
        }

        let mut enforcer = BoundaryEnforcer::new(EnforcerConfig::from_boundaries(&template.boundaries));
        let planned = plan.steps.len();
        plan.steps = enforcer.filter_steps(plan.steps);
        debug!(
            template = %template.id,
            planned,
            admitted = plan.steps.len(),
            "Applied execution boundaries"
        );

        Ok(PlannedRun {
            template,
            routing: selection.reason,
            plan,
        })
    }

    pub async fn run(
        &self,
        request: &TriageRequest,
        executor: &dyn ToolExecutor,
    ) -> Result<TriageEnvelope> {
        let planned = self.plan(request).await?;
        let mut steps = Vec::with_capacity(planned.plan.steps.len());
        for step in &planned.plan.steps {
            let result = executor
                .execute(&step.tool, &Value::Object(step.params.clone()))
                .await?;
            steps.push(ExecutedStep::new(step.tool.clone(), result));
        }
        Ok(self.assess(&planned, request, steps))
    }

    /// Score already executed steps against the planned template.
    pub fn assess(
        &self,
        planned: &PlannedRun,
        request: &TriageRequest,
        steps: Vec<ExecutedStep>,
    ) -> TriageEnvelope {
        let template = &planned.template;
        let report = self.engine.evaluate_evidence(template, &steps);
        let contract_threshold = template.evidence_contract.completeness_threshold;
        let threshold = self.thresholds.threshold_for(
            &template.id,
            (contract_threshold > 0.0).then_some(contract_threshold),
        );
        let gate = EvidenceGate {
            completeness: report.completeness,
            threshold,
            pass: report.completeness >= threshold,
            missing: report.missing,
            present: report.present,
        };

        let mut inputs = default_rubric_inputs(&template.triage_target, gate.completeness);
        inputs.extend(request.signals.clone());
        inputs.insert("evidenceCompleteness".into(), gate.completeness.into());

        let mut rubrics = evaluate_rubrics(&self.rubrics, &inputs);
        if !gate.pass {
            apply_evidence_gate(&mut rubrics);
        }
        let summary = build_summary(template, &rubrics, &gate, &inputs);
        info!(
            triage_target = %template.triage_target,
            priority = summary.priority.label.as_deref().unwrap_or("-"),
            confidence = summary.confidence.label.as_deref().unwrap_or("-"),
            allow_auto = summary.safety.allow_auto,
            completeness = %format_args!("{:.2}", gate.completeness),
            "Triage complete"
        );

        TriageEnvelope {
            plan_id: planned.plan.plan_id.clone(),
            target: template.triage_target.clone(),
            template_id: template.id.clone(),
            routing: planned.routing.clone(),
            steps,
            evidence: gate,
            rubrics,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triage_rubrics::MappingRubricResult;

    #[test]
    fn test_default_inputs_for_ingress() {
        let inputs = default_rubric_inputs("ingress-pending", 0.5);
        assert_eq!(inputs["blastRadius"], 1.0);
        assert_eq!(inputs["customerPaths"], 1.0);
        let other = default_rubric_inputs("pvc-binding", 0.5);
        assert_eq!(other["blastRadius"], 0.7);
        assert_eq!(other["evidenceCompleteness"], 0.5);
    }

    #[test]
    fn test_evidence_gate_forces_low() {
        let mut results = RubricResults::default();
        results.insert(
            "confidence",
            RubricOutcome::Mapping(MappingRubricResult {
                id: "evidence-confidence.v1".into(),
                label: "High".into(),
                matched: "evidenceCompleteness >= 0.9".into(),
            }),
        );
        apply_evidence_gate(&mut results);
        assert_eq!(results.label("confidence"), Some("Low"));
        match results.get("confidence") {
            Some(RubricOutcome::Mapping(m)) => assert_eq!(m.matched, FORCED_LOW_CONFIDENCE),
            other => panic!("unexpected outcome {:?}", other),
        }

        let mut empty = RubricResults::default();
        apply_evidence_gate(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_guard_details() {
        let safety = GuardsRubricResult {
            id: "remediation-safety.v1".into(),
            allow_auto: false,
            guards: vec![
                "etcdHealthy == true".into(),
                "affectedNamespaces <= 3".into(),
                "a && b".into(),
            ],
            failing: vec!["affectedNamespaces <= 3".into()],
        };
        let inputs = json!({ "etcdHealthy": true, "affectedNamespaces": 7 })
            .as_object()
            .cloned()
            .unwrap();

        let details = guard_details(Some(&safety), &inputs);
        assert_eq!(details[0].threshold, Some(json!(true)));
        assert!(details[0].pass);
        assert_eq!(details[1].op.as_deref(), Some("<="));
        assert_eq!(details[1].threshold, Some(json!(3.0)));
        assert_eq!(details[1].observed, Some(json!(7)));
        assert!(!details[1].pass);
        assert!(details[2].key.is_none());
    }

    #[test]
    fn test_summary_from_core_rubrics() {
        let template = DiagnosticTemplate::new("pvc-binding-v1", "pvc-binding");
        let gate = EvidenceGate {
            completeness: 1.0,
            threshold: 0.9,
            pass: true,
            missing: vec![],
            present: vec!["pvc".into()],
        };
        let inputs = default_rubric_inputs("pvc-binding", 1.0);
        let rubrics = evaluate_rubrics(&builtin::core_set(), &inputs);
        let card = build_summary(&template, &rubrics, &gate, &inputs);

        // 0.4*0.7 + 0.3*0.5 + 0.2*0.5 + 0.1*0.4 = 0.57
        assert_eq!(card.priority.label.as_deref(), Some("P2"));
        assert_eq!(card.priority.why.as_deref(), Some(">=0.55"));
        assert_eq!(card.confidence.label.as_deref(), Some("High"));
        assert!(card.safety.allow_auto);
        assert_eq!(card.safety.why, "all guards passed");
        assert_eq!(card.rubric_versions.safety, builtin::REMEDIATION_SAFETY_V1);
        assert_eq!(card.slo.unwrap().label.as_deref(), Some("Major"));
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder("<ns>"));
        assert!(!is_placeholder("<>"));
        assert!(!is_placeholder("ns"));
    }
}
