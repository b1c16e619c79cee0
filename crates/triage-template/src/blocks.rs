//! Reusable step generators referenced by name from templates.

use serde_json::{Map, Value};

use crate::types::PlannedStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockGroup {
    Infrastructure,
    Workload,
}

type BlockBuilder = fn(&str, &BlockVars<'_>) -> Vec<PlannedStep>;

#[derive(Clone, Copy)]
pub struct BlockDefinition {
    pub name: &'static str,
    pub group: BlockGroup,
    /// Context variables that must be present for the block to emit steps.
    pub required_vars: &'static [&'static str],
    build: BlockBuilder,
}

impl std::fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDefinition")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("required_vars", &self.required_vars)
            .finish()
    }
}

/// String view over plan context variables.
pub struct BlockVars<'a>(&'a Map<String, Value>);

impl BlockVars<'_> {
    /// Non-empty strings and numbers count as set.
    pub fn get(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn value(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }
}

fn describe(
    session_id: &str,
    resource_type: &str,
    namespace: Option<String>,
    name: Option<String>,
    rationale: &str,
) -> PlannedStep {
    let mut params = Map::new();
    params.insert("sessionId".into(), session_id.into());
    params.insert("resourceType".into(), resource_type.into());
    if let Some(ns) = namespace {
        params.insert("namespace".into(), ns.into());
    }
    if let Some(name) = name {
        params.insert("name".into(), name.into());
    }
    PlannedStep {
        tool: "oc_read_describe".to_string(),
        params,
        rationale: Some(rationale.to_string()),
    }
}

const BLOCKS: &[BlockDefinition] = &[
    BlockDefinition {
        name: "nodes_analysis",
        group: BlockGroup::Infrastructure,
        required_vars: &[],
        build: |_, _| Vec::new(),
    },
    BlockDefinition {
        name: "events_scheduling",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns", "pod"],
        build: |sid, v| {
            vec![describe(
                sid,
                "pod",
                v.get("ns"),
                v.get("pod"),
                "Pod events (FailedScheduling predicates)",
            )]
        },
    },
    BlockDefinition {
        name: "pod_constraints",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns", "controller"],
        build: |sid, v| {
            vec![describe(
                sid,
                "deployment",
                v.get("ns"),
                v.get("controller"),
                "Tolerations & (anti)affinity from controller",
            )]
        },
    },
    BlockDefinition {
        name: "endpoints_describe",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns", "svc"],
        build: |sid, v| {
            vec![describe(
                sid,
                "endpoints",
                v.get("ns"),
                v.get("svc"),
                "Service endpoints availability",
            )]
        },
    },
    BlockDefinition {
        name: "route_describe",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns", "route"],
        build: |sid, v| {
            vec![describe(
                sid,
                "route",
                v.get("ns"),
                v.get("route"),
                "Route spec and TLS details",
            )]
        },
    },
    BlockDefinition {
        name: "pvc_describe",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns", "pvc"],
        build: |sid, v| {
            vec![describe(
                sid,
                "pvc",
                v.get("ns"),
                v.get("pvc"),
                "PVC spec and events",
            )]
        },
    },
    BlockDefinition {
        name: "storageclass_describe",
        group: BlockGroup::Infrastructure,
        required_vars: &["sc"],
        build: |sid, v| {
            vec![describe(
                sid,
                "storageclass",
                None,
                v.get("sc"),
                "StorageClass parameters",
            )]
        },
    },
    BlockDefinition {
        name: "resourcequota_describe",
        group: BlockGroup::Infrastructure,
        required_vars: &["ns"],
        build: |sid, v| {
            vec![describe(
                sid,
                "resourcequota",
                v.get("ns"),
                None,
                "Namespace quota",
            )]
        },
    },
    BlockDefinition {
        name: "pod_logs_previous",
        group: BlockGroup::Workload,
        required_vars: &["ns", "pod"],
        build: |sid, v| {
            let mut params = Map::new();
            params.insert("sessionId".into(), sid.into());
            params.insert("namespace".into(), v.value("ns").into());
            params.insert("podName".into(), v.value("pod").into());
            params.insert("previous".into(), Value::Bool(true));
            if let Some(container) = v.get("container") {
                params.insert("container".into(), container.into());
            }
            vec![PlannedStep {
                tool: "oc_read_logs".to_string(),
                params,
                rationale: Some("Logs from the previous container instance".to_string()),
            }]
        },
    },
    BlockDefinition {
        name: "pod_probe_config",
        group: BlockGroup::Workload,
        required_vars: &["ns", "pod"],
        build: |sid, v| {
            vec![describe(
                sid,
                "pod",
                v.get("ns"),
                v.get("pod"),
                "Liveness and readiness probe configuration",
            )]
        },
    },
];

/// Registry of named blocks.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    blocks: Vec<BlockDefinition>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self {
            blocks: BLOCKS.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&BlockDefinition> {
        self.blocks.iter().find(|b| b.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.blocks.iter().map(|b| b.name).collect()
    }

    pub fn by_group(&self, group: BlockGroup) -> Vec<&BlockDefinition> {
        self.blocks.iter().filter(|b| b.group == group).collect()
    }

    /// Expand one block. Unknown blocks and blocks whose required
    /// variables are missing produce no steps.
    pub fn expand(&self, name: &str, session_id: &str, vars: &Map<String, Value>) -> Vec<PlannedStep> {
        let Some(block) = self.get(name) else {
            tracing::debug!(block = name, "Unknown block");
            return Vec::new();
        };
        let vars = BlockVars(vars);
        if let Some(missing) = block.required_vars.iter().find(|key| !vars.has(key)) {
            tracing::debug!(block = name, missing = *missing, "Block skipped, variable not set");
            return Vec::new();
        }
        (block.build)(session_id, &vars)
    }
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_events_scheduling_block() {
        let registry = BlockRegistry::new();
        let steps = registry.expand(
            "events_scheduling",
            "s-1",
            &vars(json!({ "ns": "shop", "pod": "web-0" })),
        );
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].tool, "oc_read_describe");
        assert_eq!(steps[0].params["resourceType"], "pod");
        assert_eq!(steps[0].params["namespace"], "shop");
        assert_eq!(steps[0].params["name"], "web-0");
        assert_eq!(steps[0].params["sessionId"], "s-1");
    }

    #[test]
    fn test_missing_vars_contribute_nothing() {
        let registry = BlockRegistry::new();
        assert!(registry
            .expand("pod_constraints", "s", &vars(json!({ "ns": "shop" })))
            .is_empty());
        assert!(registry
            .expand("events_scheduling", "s", &vars(json!({ "ns": "shop", "pod": "" })))
            .is_empty());
    }

    #[test]
    fn test_unknown_and_empty_blocks() {
        let registry = BlockRegistry::new();
        assert!(registry.expand("nope", "s", &Map::new()).is_empty());
        assert!(registry.expand("nodes_analysis", "s", &Map::new()).is_empty());
    }

    #[test]
    fn test_storageclass_has_no_namespace() {
        let registry = BlockRegistry::new();
        let steps = registry.expand("storageclass_describe", "s", &vars(json!({ "sc": "gp3" })));
        assert!(steps[0].params.get("namespace").is_none());
        assert_eq!(steps[0].params["name"], "gp3");
    }

    #[test]
    fn test_logs_previous_optional_container() {
        let registry = BlockRegistry::new();
        let base = vars(json!({ "ns": "shop", "pod": "web-0" }));
        let without = registry.expand("pod_logs_previous", "s", &base);
        assert!(without[0].params.get("container").is_none());

        let mut with = base.clone();
        with.insert("container".into(), json!("app"));
        let steps = registry.expand("pod_logs_previous", "s", &with);
        assert_eq!(steps[0].params["container"], "app");
        assert_eq!(steps[0].params["previous"], true);
    }

    #[test]
    fn test_groups() {
        let registry = BlockRegistry::new();
        assert_eq!(registry.by_group(BlockGroup::Workload).len(), 2);
        assert_eq!(registry.by_group(BlockGroup::Infrastructure).len(), 8);
    }
}
