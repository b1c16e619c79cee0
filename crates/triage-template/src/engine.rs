use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::blocks::BlockRegistry;
use crate::placeholder::replace_vars;
use crate::selector::SelectorInput;
use crate::types::{
    DiagnosticTemplate, EvidenceReport, ExecutedStep, PlanBoundaries, PlanContext, PlanResult,
    PlannedStep,
};

/// Turns templates into bounded plans and scores what the plan produced.
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    blocks: BlockRegistry,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blocks(blocks: BlockRegistry) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &BlockRegistry {
        &self.blocks
    }

    pub fn build_plan(&self, template: &DiagnosticTemplate, context: &PlanContext) -> PlanResult {
        let mut combined: Vec<PlannedStep> = template
            .steps
            .iter()
            .map(|step| {
                let mut params = Map::new();
                params.insert("sessionId".into(), Value::String(context.session_id.clone()));
                params.extend(step.params.clone());
                let params = match replace_vars(&Value::Object(params), &context.vars) {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                PlannedStep {
                    tool: step.tool.clone(),
                    params,
                    rationale: step.rationale.clone(),
                }
            })
            .collect();

        let mut block_vars = Map::new();
        block_vars.insert("sessionId".into(), Value::String(context.session_id.clone()));
        block_vars.extend(context.vars.clone());
        for block in &template.blocks {
            combined.extend(self.blocks.expand(block, &context.session_id, &block_vars));
        }

        let budget = effective_budget(
            context.step_budget,
            template.boundaries.max_steps,
            combined.len(),
        );
        combined.truncate(budget);
        debug!(
            template = %template.id,
            session = %context.session_id,
            steps = combined.len(),
            budget,
            "Built plan"
        );

        PlanResult {
            plan_id: context.session_id.clone(),
            steps: combined,
            boundaries: PlanBoundaries {
                max_steps: budget,
                timeout_ms: template.boundaries.timeout_ms,
            },
        }
    }

    pub fn evaluate_evidence(
        &self,
        template: &DiagnosticTemplate,
        executed: &[ExecutedStep],
    ) -> EvidenceReport {
        let contract = &template.evidence_contract;
        let input = SelectorInput::new(executed.iter().map(|e| &e.result));

        let (present, missing): (Vec<String>, Vec<String>) =
            contract.required.iter().cloned().partition(|key| {
                contract
                    .selectors
                    .get(key)
                    .map(|selectors| selectors.iter().any(|s| input.matches(s)))
                    .unwrap_or(false)
            });

        let completeness = if contract.required.is_empty() {
            1.0
        } else {
            present.len() as f64 / contract.required.len() as f64
        };
        info!(
            triage_target = %template.triage_target,
            completeness = %format_args!("{:.2}", completeness),
            "Evidence completeness"
        );

        EvidenceReport {
            completeness,
            missing,
            present,
        }
    }
}

/// `max(1, min(budget, max_steps, len))`, ignoring unset (zero) limits.
fn effective_budget(step_budget: Option<usize>, max_steps: usize, len: usize) -> usize {
    let len = len.max(1);
    [step_budget.unwrap_or(0), max_steps]
        .into_iter()
        .filter(|limit| *limit > 0)
        .fold(len, usize::min)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EvidenceSelector, SelectorType, TemplateStep};
    use serde_json::json;

    fn five_step_template() -> DiagnosticTemplate {
        let mut template = DiagnosticTemplate::new("t", "scheduling-failures").with_max_steps(10);
        for i in 0..5 {
            template = template.with_step(TemplateStep::new(format!("tool_{}", i)));
        }
        template
    }

    #[test]
    fn test_plan_truncated_to_step_budget() {
        let engine = TemplateEngine::new();
        let plan = engine.build_plan(
            &five_step_template(),
            &PlanContext::new("s1").with_step_budget(3),
        );
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.boundaries.max_steps, 3);
        assert_eq!(plan.plan_id, "s1");
    }

    #[test]
    fn test_plan_truncated_to_template_max_steps() {
        let engine = TemplateEngine::new();
        let template = five_step_template().with_max_steps(2);
        let plan = engine.build_plan(&template, &PlanContext::new("s1").with_step_budget(4));
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.boundaries.max_steps, 2);
    }

    #[test]
    fn test_empty_template_reports_budget_of_one() {
        let engine = TemplateEngine::new();
        let plan = engine.build_plan(&DiagnosticTemplate::new("e", "x"), &PlanContext::new("s"));
        assert!(plan.steps.is_empty());
        assert_eq!(plan.boundaries.max_steps, 1);
    }

    #[test]
    fn test_effective_budget() {
        assert_eq!(effective_budget(None, 0, 4), 4);
        assert_eq!(effective_budget(Some(0), 0, 4), 4);
        assert_eq!(effective_budget(Some(10), 0, 4), 4);
        assert_eq!(effective_budget(Some(2), 3, 4), 2);
        assert_eq!(effective_budget(None, 0, 0), 1);
    }

    #[test]
    fn test_session_id_and_vars_in_params() {
        let engine = TemplateEngine::new();
        let template = DiagnosticTemplate::new("t", "x").with_step(
            TemplateStep::new("oc_read_get_pods")
                .with_param("namespace", "<ns>")
                .with_param("selector", "<labelSelector>"),
        );
        let plan = engine.build_plan(&template, &PlanContext::new("s-9").with_var("ns", "shop"));
        let params = &plan.steps[0].params;
        assert_eq!(params["sessionId"], "s-9");
        assert_eq!(params["namespace"], "shop");
        assert_eq!(params["selector"], "<labelSelector>");
    }

    #[test]
    fn test_template_session_id_param_wins() {
        let engine = TemplateEngine::new();
        let template = DiagnosticTemplate::new("t", "x")
            .with_step(TemplateStep::new("a").with_param("sessionId", "fixed"));
        let plan = engine.build_plan(&template, &PlanContext::new("s"));
        assert_eq!(plan.steps[0].params["sessionId"], "fixed");
    }

    #[test]
    fn test_blocks_follow_static_steps() {
        let engine = TemplateEngine::new();
        let template = DiagnosticTemplate::new("t", "scheduling-failures")
            .with_step(TemplateStep::new("oc_read_get_pods"))
            .with_block("events_scheduling")
            .with_block("pod_constraints");
        let plan = engine.build_plan(
            &template,
            &PlanContext::new("s").with_var("ns", "shop").with_var("pod", "web-0"),
        );
        // pod_constraints needs a controller name
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[1].tool, "oc_read_describe");
        assert_eq!(
            plan.steps[1].rationale.as_deref(),
            Some("Pod events (FailedScheduling predicates)")
        );
    }

    #[test]
    fn test_evidence_partial_completeness() {
        let engine = TemplateEngine::new();
        let template = DiagnosticTemplate::new("t", "x")
            .with_evidence("x", vec![EvidenceSelector::new(SelectorType::Dsl, "alpha")])
            .with_evidence("y", vec![EvidenceSelector::new(SelectorType::Dsl, "beta")])
            .with_evidence("z", vec![EvidenceSelector::new(SelectorType::Jsonpath, ".gamma")]);
        let executed = vec![ExecutedStep::new("t1", json!("alpha reported"))];

        let report = engine.evaluate_evidence(&template, &executed);
        assert!((report.completeness - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.present, vec!["x".to_string()]);
        assert_eq!(report.missing, vec!["y".to_string(), "z".to_string()]);
    }

    #[test]
    fn test_evidence_tries_selectors_in_turn() {
        let engine = TemplateEngine::new();
        let template = DiagnosticTemplate::new("t", "x").with_evidence(
            "routerPods",
            vec![
                EvidenceSelector::new(SelectorType::EventsRegex, "(bad"),
                EvidenceSelector::new(SelectorType::Jsonpath, "{.items[*].metadata.name}"),
            ],
        );
        let executed = vec![ExecutedStep::new(
            "oc_read_get_pods",
            json!({ "items": [{ "metadata": { "name": "router-default-1" } }] }),
        )];
        let report = engine.evaluate_evidence(&template, &executed);
        assert_eq!(report.completeness, 1.0);
        assert!(report.missing.is_empty());
    }

    #[test]
    fn test_no_required_evidence_is_complete() {
        let engine = TemplateEngine::new();
        let report = engine.evaluate_evidence(&DiagnosticTemplate::new("t", "x"), &[]);
        assert_eq!(report.completeness, 1.0);
    }

    #[test]
    fn test_key_without_selectors_is_missing() {
        let engine = TemplateEngine::new();
        let mut template = DiagnosticTemplate::new("t", "x");
        template.evidence_contract.required.push("orphan".into());
        let report = engine.evaluate_evidence(&template, &[ExecutedStep::new("a", json!("orphan"))]);
        assert_eq!(report.missing, vec!["orphan".to_string()]);
        assert_eq!(report.completeness, 0.0);
    }
}
