//! Command handlers. Every command prints one JSON document to stdout.

use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::path::Path;
use tracing::debug;

use triage_copilot::rubrics::{ExprEvaluator, RubricRegistry, evaluate_rubric};
use triage_copilot::template::ExecutedStep;
use triage_copilot::{CopilotConfig, TriageRequest, TriageRunner};

use crate::cli::{Commands, RequestArgs, TemplateCommands};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateRow {
    id: String,
    name: String,
    version: String,
    triage_target: String,
    steps: usize,
    blocks: Vec<String>,
}

pub async fn run(command: Commands, config: &CopilotConfig) -> Result<()> {
    match command {
        Commands::Templates {
            action: TemplateCommands::List,
        } => list_templates(config),
        Commands::Plan { request } => plan(config, &request).await,
        Commands::Evidence {
            request,
            results,
            signals,
        } => evidence(config, &request, &results, &signals).await,
        Commands::Rubric { id, file, inputs } => {
            rubric(id.as_deref(), file.as_deref(), &inputs)
        }
        Commands::Expr { expression, vars } => expr(&expression, &vars),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn list_templates(config: &CopilotConfig) -> Result<()> {
    let runner = TriageRunner::from_config(config)?;
    let rows: Vec<TemplateRow> = runner
        .templates()
        .list()
        .iter()
        .map(|t| TemplateRow {
            id: t.id.clone(),
            name: t.name.clone(),
            version: t.version.clone(),
            triage_target: t.triage_target.clone(),
            steps: t.steps.len(),
            blocks: t.blocks.clone(),
        })
        .collect();
    print_json(&rows)
}

async fn plan(config: &CopilotConfig, args: &RequestArgs) -> Result<()> {
    let runner = TriageRunner::from_config(config)?;
    let request = build_request(args)?;
    let planned = runner.plan(&request).await?;
    print_json(&json!({
        "templateId": planned.template.id,
        "templateVersion": planned.template.version,
        "routing": planned.routing,
        "plan": planned.plan,
    }))
}

async fn evidence(
    config: &CopilotConfig,
    args: &RequestArgs,
    results: &Path,
    signals: &[String],
) -> Result<()> {
    let runner = TriageRunner::from_config(config)?;
    let mut request = build_request(args)?;
    for signal in signals {
        let (key, value) = parse_key_value(signal)?;
        request.signals.insert(key, value);
    }

    let raw = std::fs::read_to_string(results)
        .with_context(|| format!("reading step results from {}", results.display()))?;
    let steps: Vec<ExecutedStep> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing step results in {}", results.display()))?;
    debug!(steps = steps.len(), "Loaded executed steps");

    let planned = runner.plan(&request).await?;
    let envelope = runner.assess(&planned, &request, steps);
    print_json(&envelope)
}

fn rubric(id: Option<&str>, file: Option<&Path>, inputs: &str) -> Result<()> {
    let mut registry = RubricRegistry::with_core_rubrics();
    let id = match (id, file) {
        (_, Some(path)) => registry.load_file(path)?,
        (Some(id), None) => id.to_string(),
        (None, None) => bail!("either --id or --file is required"),
    };
    let rubric = registry.get(&id).ok_or_else(|| {
        let known: Vec<&str> = registry.list().iter().map(|r| r.id()).collect();
        anyhow!("unknown rubric '{}' (known: {})", id, known.join(", "))
    })?;

    let inputs = read_json_arg(inputs)?;
    print_json(&evaluate_rubric(rubric, &inputs))
}

fn expr(expression: &str, vars: &str) -> Result<()> {
    let vars = read_json_arg(vars)?;
    let result = ExprEvaluator::new()
        .evaluate(expression, &vars)
        .with_context(|| format!("evaluating '{}'", expression))?;
    print_json(&json!({ "expression": expression, "result": result }))
}

fn build_request(args: &RequestArgs) -> Result<TriageRequest> {
    let mut request = TriageRequest::new(args.target.as_str());
    if let Some(ns) = &args.namespace {
        request = request.with_namespace(ns.as_str());
    }
    if let Some(session) = &args.session {
        request = request.with_session_id(session.as_str());
    }
    if let Some(budget) = args.budget {
        request = request.with_step_budget(budget);
    }
    for var in &args.vars {
        let (key, value) = parse_key_value(var)?;
        request.vars.insert(key, value);
    }
    Ok(request)
}

/// `key=value` where the value is JSON when it parses and a string otherwise.
pub fn parse_key_value(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("empty key in '{}'", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Inline JSON object, or `@path` to a file holding one.
pub fn read_json_arg(raw: &str) -> Result<Map<String, Value>> {
    let text = match raw.strip_prefix('@') {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?
        }
        None => raw.to_string(),
    };
    match serde_json::from_str::<Value>(&text).context("parsing JSON argument")? {
        Value::Object(map) => Ok(map),
        other => bail!("expected a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("replicas=3").unwrap(),
            ("replicas".to_string(), json!(3))
        );
        assert_eq!(
            parse_key_value("pod=router-default-1").unwrap(),
            ("pod".to_string(), json!("router-default-1"))
        );
        assert_eq!(
            parse_key_value("etcdHealthy=true").unwrap(),
            ("etcdHealthy".to_string(), json!(true))
        );
        assert_eq!(
            parse_key_value("selector=app=web").unwrap(),
            ("selector".to_string(), json!("app=web"))
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=1").is_err());
    }

    #[test]
    fn test_read_json_arg_inline_and_file() {
        let inline = read_json_arg(r#"{"a": 1}"#).unwrap();
        assert_eq!(inline["a"], 1);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inputs.json");
        fs::write(&path, r#"{"blastRadius": 0.7}"#).unwrap();
        let from_file = read_json_arg(&format!("@{}", path.display())).unwrap();
        assert_eq!(from_file["blastRadius"], 0.7);

        assert!(read_json_arg("[1, 2]").is_err());
        assert!(read_json_arg("@/nonexistent/inputs.json").is_err());
    }

    #[test]
    fn test_build_request() {
        let args = RequestArgs {
            target: "pvc-binding".into(),
            namespace: Some("storage".into()),
            session: None,
            vars: vec!["pvc=data-0".into()],
            budget: Some(3),
        };
        let request = build_request(&args).unwrap();
        assert_eq!(request.triage_target, "pvc-binding");
        assert_eq!(request.namespace.as_deref(), Some("storage"));
        assert_eq!(request.vars["pvc"], "data-0");
        assert_eq!(request.step_budget, Some(3));
    }

    #[test]
    fn test_unknown_rubric_id() {
        let err = rubric(Some("nope.v1"), None, "{}").unwrap_err();
        assert!(err.to_string().contains("triage-priority.v1"));
    }

    #[test]
    fn test_invalid_expression_is_an_error() {
        assert!(expr("a >", r#"{"a": 1}"#).is_err());
        assert!(expr("a > 0", r#"{"a": 1}"#).is_ok());
    }
}
