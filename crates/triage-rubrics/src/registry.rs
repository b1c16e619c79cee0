use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use triage_core::{Result, TriageError};

use crate::builtin;
use crate::config::Rubric;

/// Rubrics indexed by id. Registering an existing id replaces it.
#[derive(Debug, Clone, Default)]
pub struct RubricRegistry {
    by_id: BTreeMap<String, Rubric>,
}

impl RubricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core_rubrics() -> Self {
        let mut registry = Self::new();
        registry.load_core_rubrics();
        registry
    }

    pub fn load_core_rubrics(&mut self) {
        for rubric in builtin::all() {
            self.register(rubric);
        }
    }

    pub fn register(&mut self, rubric: Rubric) {
        debug!(id = %rubric.id(), kind = rubric.kind(), "Registering rubric");
        self.by_id.insert(rubric.id().to_string(), rubric);
    }

    pub fn get(&self, id: &str) -> Option<&Rubric> {
        self.by_id.get(id)
    }

    pub fn list(&self) -> Vec<&Rubric> {
        self.by_id.values().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Load a rubric definition from a `.json`, `.yaml` or `.yml` file.
    /// Returns the id of the loaded rubric.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<String> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let rubric = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Rubric::from_json(&content)?,
            Some("yaml") | Some("yml") => Rubric::from_yaml(&content)?,
            other => {
                return Err(TriageError::Rubric(format!(
                    "unsupported rubric file extension {:?} for {}",
                    other,
                    path.display()
                )));
            }
        };

        let id = rubric.id().to_string();
        info!(id = %id, path = %path.display(), "Loaded rubric");
        self.register(rubric);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardsRubric;
    use tempfile::TempDir;

    #[test]
    fn test_core_rubrics_registered() {
        let registry = RubricRegistry::with_core_rubrics();
        assert_eq!(registry.len(), 4);
        assert!(registry.get(builtin::REMEDIATION_SAFETY_V1).is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = RubricRegistry::new();
        registry.register(GuardsRubric::new("g").with_guard("a == 1").into());
        registry.register(GuardsRubric::new("g").with_guard("b == 1").into());
        assert_eq!(registry.len(), 1);
        let Some(Rubric::Guards(g)) = registry.get("g") else {
            panic!("expected guards rubric");
        };
        assert_eq!(g.guards, vec!["b == 1".to_string()]);
    }

    #[test]
    fn test_load_yaml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf.yaml");
        std::fs::write(
            &path,
            "kind: mapping\nid: conf.v2\ninputs: [x]\nmapping:\n  High: x > 1\n  Low: otherwise\n",
        )
        .unwrap();

        let mut registry = RubricRegistry::new();
        let id = registry.load_file(&path).unwrap();
        assert_eq!(id, "conf.v2");
        assert_eq!(registry.get(&id).unwrap().kind(), "mapping");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_load_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("conf.toml");
        std::fs::write(&path, "id = 'x'").unwrap();
        let mut registry = RubricRegistry::new();
        assert!(matches!(
            registry.load_file(&path),
            Err(TriageError::Rubric(_))
        ));
    }
}
