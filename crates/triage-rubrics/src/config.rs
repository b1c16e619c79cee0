use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use triage_core::{Result, TriageError};

/// Ordered `label -> expression` entries.
///
/// Serialized as a map; deserializing from JSON or YAML text keeps the
/// document order, which decides the first-match result. A sequence of
/// `[label, expression]` pairs is accepted as well.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions(Vec<(String, String)>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, label: impl Into<String>, expression: impl Into<String>) -> Self {
        self.push(label, expression);
        self
    }

    pub fn push(&mut self, label: impl Into<String>, expression: impl Into<String>) {
        self.0.push((label.into(), expression.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(l, e)| (l.as_str(), e.as_str()))
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, e)| e.as_str())
    }

    pub fn labels(&self) -> Vec<&str> {
        self.0.iter().map(|(l, _)| l.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<L: Into<String>, E: Into<String>> FromIterator<(L, E)> for Conditions {
    fn from_iter<I: IntoIterator<Item = (L, E)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(l, e)| (l.into(), e.into()))
                .collect(),
        )
    }
}

impl Serialize for Conditions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, expression) in &self.0 {
            map.serialize_entry(label, expression)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Conditions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ConditionsVisitor;

        impl<'de> Visitor<'de> for ConditionsVisitor {
            type Value = Conditions;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of label to expression")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Conditions, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((label, expression)) = access.next_entry::<String, String>()? {
                    entries.push((label, expression));
                }
                Ok(Conditions(entries))
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Conditions, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(pair) = access.next_element::<(String, String)>()? {
                    entries.push(pair);
                }
                Ok(Conditions(entries))
            }
        }

        deserializer.deserialize_any(ConditionsVisitor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeightedRubric {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,
    /// Per-input normalization spec, e.g. `clamp:0..180->0..1`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalize: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub bands: Conditions,
}

impl WeightedRubric {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            weights: BTreeMap::new(),
            normalize: None,
            bands: Conditions::new(),
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, weight: f64) -> Self {
        let name = name.into();
        self.weights.insert(name.clone(), weight);
        self.inputs.push(name);
        self
    }

    pub fn with_normalize(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
        self.normalize
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), spec.into());
        self
    }

    pub fn with_band(mut self, label: impl Into<String>, condition: impl Into<String>) -> Self {
        self.bands.push(label, condition);
        self
    }

    pub fn normalize_spec(&self, input: &str) -> Option<&str> {
        self.normalize
            .as_ref()
            .and_then(|n| n.get(input))
            .map(String::as_str)
    }
}

/// Free-form note on what the guard outcome authorizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuardDecision {
    pub allow_auto: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuardsRubric {
    pub id: String,
    #[serde(default)]
    pub guards: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<GuardDecision>,
}

impl GuardsRubric {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            guards: Vec::new(),
            decision: None,
        }
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guards.push(guard.into());
        self
    }

    pub fn with_decision(mut self, note: impl Into<String>) -> Self {
        self.decision = Some(GuardDecision {
            allow_auto: note.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MappingRubric {
    pub id: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub mapping: Conditions,
}

impl MappingRubric {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            mapping: Conditions::new(),
        }
    }

    pub fn with_inputs(mut self, inputs: Vec<String>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>, condition: impl Into<String>) -> Self {
        self.mapping.push(label, condition);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rubric {
    Weighted(WeightedRubric),
    Guards(GuardsRubric),
    Mapping(MappingRubric),
}

impl Rubric {
    pub fn id(&self) -> &str {
        match self {
            Rubric::Weighted(r) => &r.id,
            Rubric::Guards(r) => &r.id,
            Rubric::Mapping(r) => &r.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rubric::Weighted(_) => "weighted",
            Rubric::Guards(_) => "guards",
            Rubric::Mapping(_) => "mapping",
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let rubric: Rubric = serde_json::from_str(json)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rubric: Rubric = serde_yaml::from_str(yaml)?;
        rubric.validate()?;
        Ok(rubric)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id().trim().is_empty() {
            return Err(TriageError::Rubric("rubric id must not be empty".into()));
        }
        if let Rubric::Weighted(w) = self {
            if let Some(missing) = w.inputs.iter().find(|i| !w.weights.contains_key(*i)) {
                tracing::debug!(rubric = %w.id, input = %missing, "Input without weight contributes 0");
            }
        }
        Ok(())
    }
}

impl From<WeightedRubric> for Rubric {
    fn from(r: WeightedRubric) -> Self {
        Rubric::Weighted(r)
    }
}

impl From<GuardsRubric> for Rubric {
    fn from(r: GuardsRubric) -> Self {
        Rubric::Guards(r)
    }
}

impl From<MappingRubric> for Rubric {
    fn from(r: MappingRubric) -> Self {
        Rubric::Mapping(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_preserve_document_order() {
        let json = r#"{"kind":"mapping","id":"m","inputs":["x"],"mapping":{"Z":"x > 10","A":"x > 0","M":"otherwise"}}"#;
        let rubric = Rubric::from_json(json).unwrap();
        match rubric {
            Rubric::Mapping(m) => assert_eq!(m.mapping.labels(), vec!["Z", "A", "M"]),
            other => panic!("expected mapping, got {}", other.kind()),
        }
    }

    #[test]
    fn test_yaml_weighted_rubric() {
        let yaml = r#"
kind: weighted
id: triage.v1
inputs: [severity, scope]
weights:
  severity: 0.7
  scope: 0.3
bands:
  P1: ">=0.8"
  P2: ">=0.5"
  P3: otherwise
"#;
        let rubric = Rubric::from_yaml(yaml).unwrap();
        assert_eq!(rubric.id(), "triage.v1");
        assert_eq!(rubric.kind(), "weighted");
        let Rubric::Weighted(w) = rubric else {
            panic!("expected weighted");
        };
        assert_eq!(w.bands.labels(), vec!["P1", "P2", "P3"]);
        assert_eq!(w.bands.get("P3"), Some("otherwise"));
        assert_eq!(w.weights["severity"], 0.7);
    }

    #[test]
    fn test_guards_decision_camel_case() {
        let json = r#"{"kind":"guards","id":"safety","guards":["a == true"],"decision":{"allowAuto":"all guards true"}}"#;
        let Rubric::Guards(g) = Rubric::from_json(json).unwrap() else {
            panic!("expected guards");
        };
        assert_eq!(g.decision.unwrap().allow_auto, "all guards true");
    }

    #[test]
    fn test_conditions_from_pairs() {
        let json = r#"[["High", "x > 1"], ["Low", "otherwise"]]"#;
        let conditions: Conditions = serde_json::from_str(json).unwrap();
        assert_eq!(conditions.labels(), vec!["High", "Low"]);
    }

    #[test]
    fn test_conditions_serialize_as_map() {
        let conditions = Conditions::new().with("B", "x > 1").with("A", "otherwise");
        let text = serde_json::to_string(&conditions).unwrap();
        assert_eq!(text, r#"{"B":"x > 1","A":"otherwise"}"#);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"kind":"fuzzy","id":"x"}"#;
        assert!(Rubric::from_json(json).is_err());
    }

    #[test]
    fn test_empty_id_rejected() {
        let rubric: Rubric = GuardsRubric::new(" ").into();
        assert!(matches!(rubric.validate(), Err(TriageError::Rubric(_))));
    }
}
