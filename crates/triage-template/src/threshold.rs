use std::collections::HashSet;

pub const DEFAULT_THRESHOLD: f64 = 0.9;
pub const LEGACY_THRESHOLD: f64 = 0.7;

/// Completeness threshold per template.
#[derive(Debug, Clone, Default)]
pub struct EvidenceThresholdManager {
    legacy_ids: HashSet<String>,
}

impl EvidenceThresholdManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_legacy_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            legacy_ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn add_legacy_id(&mut self, id: impl Into<String>) {
        self.legacy_ids.insert(id.into());
    }

    pub fn is_legacy(&self, template_id: &str) -> bool {
        self.legacy_ids.contains(template_id)
    }

    /// A caller-supplied fallback wins; legacy templates get the relaxed
    /// threshold; everything else the default.
    pub fn threshold_for(&self, template_id: &str, fallback: Option<f64>) -> f64 {
        if let Some(explicit) = fallback {
            return explicit;
        }
        if self.is_legacy(template_id) {
            LEGACY_THRESHOLD
        } else {
            DEFAULT_THRESHOLD
        }
    }
}
