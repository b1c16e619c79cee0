use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use triage_core::Result;

use crate::types::{DiagnosticTemplate, TemplateSelection};

#[derive(Debug, Default)]
struct Catalog {
    by_id: HashMap<String, Arc<DiagnosticTemplate>>,
    by_target: HashMap<String, Vec<Arc<DiagnosticTemplate>>>,
}

impl Catalog {
    fn insert(&mut self, template: DiagnosticTemplate) {
        let template = Arc::new(template);
        self.by_target
            .entry(template.triage_target.clone())
            .or_default()
            .push(template.clone());
        self.by_id.insert(template.id.clone(), template);
    }
}

/// Read-only catalog of diagnostic templates loaded from a directory of
/// `*.json` files.
///
/// Versions are compared as plain strings, so `1.10.0` sorts before
/// `1.9.0`.
pub struct TemplateRegistry {
    base_dir: PathBuf,
    catalog: RwLock<Arc<Catalog>>,
}

impl TemplateRegistry {
    /// An empty registry rooted at `base_dir`; call [`reload`](Self::reload)
    /// to populate it.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            catalog: RwLock::new(Arc::new(Catalog::default())),
        }
    }

    pub fn load(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let registry = Self::new(base_dir);
        registry.reload()?;
        Ok(registry)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Rebuild the catalog from disk and swap it in. Returns the number of
    /// templates loaded.
    pub fn reload(&self) -> Result<usize> {
        let catalog = build_catalog(&self.base_dir)?;
        let count = catalog.by_id.len();
        *self.catalog.write() = Arc::new(catalog);
        info!(dir = %self.base_dir.display(), count, "Loaded diagnostic templates");
        Ok(count)
    }

    fn snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<DiagnosticTemplate>> {
        self.snapshot().by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All templates sorted by id.
    pub fn list(&self) -> Vec<Arc<DiagnosticTemplate>> {
        let mut templates: Vec<_> = self.snapshot().by_id.values().cloned().collect();
        templates.sort_by(|a, b| a.id.cmp(&b.id));
        templates
    }

    pub fn targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self.snapshot().by_target.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// The lexically greatest version for `target`; later files win ties.
    pub fn select_by_target(&self, target: &str) -> Option<TemplateSelection> {
        let catalog = self.snapshot();
        let template = catalog
            .by_target
            .get(target)?
            .iter()
            .max_by(|a, b| a.version.cmp(&b.version))?
            .clone();
        Some(TemplateSelection {
            template,
            reason: format!("latest for target {}", target),
        })
    }
}

fn build_catalog(dir: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::default();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Template directory missing, catalog empty");
            return Ok(catalog);
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    for path in files {
        match parse_template_file(&path) {
            Ok(template) => {
                debug!(id = %template.id, triage_target = %template.triage_target, "Loaded template");
                catalog.insert(template);
            }
            Err(reason) => warn!(path = %path.display(), reason = %reason, "Skipping template file"),
        }
    }

    Ok(catalog)
}

fn parse_template_file(path: &Path) -> std::result::Result<DiagnosticTemplate, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;

    let non_empty = |key: &str| {
        value
            .get(key)
            .and_then(Value::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    };
    if !non_empty("id") {
        return Err("missing id".into());
    }
    if !non_empty("triageTarget") {
        return Err("missing triageTarget".into());
    }
    if !value.get("steps").map(Value::is_array).unwrap_or(false) {
        return Err("steps is not an array".into());
    }

    serde_json::from_value(value).map_err(|e| e.to_string())
}
