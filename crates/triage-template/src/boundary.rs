use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::types::{ExecutionBoundaries, PlannedStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreaker {
    pub window: Duration,
    pub max_repeat_calls_per_tool: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnforcerConfig {
    pub max_steps: usize,
    pub timeout_ms: u64,
    pub allowed_namespaces: Vec<String>,
    pub tool_whitelist: Vec<String>,
    pub circuit: Option<CircuitBreaker>,
}

impl EnforcerConfig {
    /// A zero `maxSteps` in the template leaves the step count unlimited.
    pub fn from_boundaries(boundaries: &ExecutionBoundaries) -> Self {
        Self {
            max_steps: if boundaries.max_steps == 0 {
                usize::MAX
            } else {
                boundaries.max_steps
            },
            timeout_ms: boundaries.timeout_ms,
            allowed_namespaces: boundaries.allowed_namespaces.clone(),
            tool_whitelist: boundaries.tool_whitelist.clone(),
            circuit: boundaries.circuit_breaker.map(|cb| CircuitBreaker {
                window: Duration::from_millis(cb.window_ms),
                max_repeat_calls_per_tool: cb.max_repeat_calls_per_tool,
            }),
        }
    }
}

/// Applies execution boundaries to a plan before it runs.
///
/// The circuit breaker remembers admitted `tool + params` keys across
/// calls to [`BoundaryEnforcer::filter_steps`] for the configured window.
#[derive(Debug, Clone)]
pub struct BoundaryEnforcer {
    config: EnforcerConfig,
    recent: Vec<(String, Instant)>,
}

impl BoundaryEnforcer {
    pub fn new(config: EnforcerConfig) -> Self {
        Self {
            config,
            recent: Vec::new(),
        }
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    pub fn filter_steps(&mut self, steps: Vec<PlannedStep>) -> Vec<PlannedStep> {
        self.filter_steps_at(steps, Instant::now())
    }

    pub fn filter_steps_at(&mut self, steps: Vec<PlannedStep>, now: Instant) -> Vec<PlannedStep> {
        let config = &self.config;
        let mut filtered: Vec<PlannedStep> = steps
            .into_iter()
            .take(config.max_steps)
            .filter(|step| {
                let allowed =
                    config.tool_whitelist.is_empty() || config.tool_whitelist.contains(&step.tool);
                if !allowed {
                    debug!(tool = %step.tool, "Step dropped, tool not whitelisted");
                }
                allowed
            })
            .filter(|step| {
                let ns = step
                    .params
                    .get("namespace")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                let allowed = config.allowed_namespaces.is_empty()
                    || ns.is_empty()
                    || config.allowed_namespaces.iter().any(|a| a == ns);
                if !allowed {
                    debug!(tool = %step.tool, namespace = ns, "Step dropped, namespace not allowed");
                }
                allowed
            })
            .collect();

        if let Some(circuit) = self.config.circuit {
            let limit = circuit.max_repeat_calls_per_tool.max(1);
            let mut admitted = Vec::with_capacity(filtered.len());
            for step in filtered {
                let key = format!("{}:{}", step.tool, Value::Object(step.params.clone()));
                let within = self
                    .recent
                    .iter()
                    .filter(|(k, at)| *k == key && now.saturating_duration_since(*at) < circuit.window)
                    .count();
                if within >= limit {
                    debug!(tool = %step.tool, "Step dropped by circuit breaker");
                    continue;
                }
                self.recent.push((key, now));
                admitted.push(step);
            }
            self.recent
                .retain(|(_, at)| now.saturating_duration_since(*at) < circuit.window);
            filtered = admitted;
        }

        filtered
    }
}
