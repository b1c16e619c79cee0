//! `<name>` placeholder substitution and resource discovery fallbacks

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;
use triage_core::Result;

/// Replace every string that is exactly `<name>` with `vars[name]`.
///
/// Substitution is recursive over objects and arrays. Unknown names and
/// strings that merely contain a placeholder are left untouched.
pub fn replace_vars(value: &Value, vars: &Map<String, Value>) -> Value {
    match value {
        Value::String(s) => placeholder_name(s)
            .and_then(|name| vars.get(name))
            .cloned()
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(|v| replace_vars(v, vars)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), replace_vars(v, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn placeholder_name(s: &str) -> Option<&str> {
    let name = s.strip_prefix('<')?.strip_suffix('>')?;
    (!name.is_empty() && !name.contains('>')).then_some(name)
}

/// Well-known defaults for placeholders discovery could not resolve.
pub fn fallback_resource(placeholder: &str) -> &'static str {
    let key: String = placeholder.chars().filter(|c| *c != '<' && *c != '>').collect();
    match key.as_str() {
        "ingressNamespace" => "openshift-ingress",
        "ingressControllerNamespace" => "openshift-ingress-operator",
        "ingressControllerName" => "default",
        _ => "",
    }
}

/// Looks up live cluster resources that could fill a placeholder.
#[async_trait]
pub trait ResourceDiscoverer: Send + Sync {
    async fn discover(&self, placeholder: &str, context: &Map<String, Value>) -> Result<Vec<String>>;
}

/// First discovered resource, else the well-known fallback.
pub async fn resolve_placeholder(
    placeholder: &str,
    context: &Map<String, Value>,
    discoverer: Option<&dyn ResourceDiscoverer>,
) -> String {
    let Some(discoverer) = discoverer else {
        return fallback_resource(placeholder).to_string();
    };

    match discoverer.discover(placeholder, context).await {
        Ok(resources) => match resources.into_iter().next() {
            Some(first) => first,
            None => {
                warn!(placeholder, "No resources found, using fallback");
                fallback_resource(placeholder).to_string()
            }
        },
        Err(e) => {
            warn!(placeholder, error = %e, "Resource discovery failed, using fallback");
            fallback_resource(placeholder).to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triage_core::TriageError;

    #[test]
    fn test_replace_vars_nested() {
        let vars = json!({ "ns": "shop", "replicas": 3 }).as_object().cloned().unwrap();
        let params = json!({
            "namespace": "<ns>",
            "count": "<replicas>",
            "nested": { "list": ["<ns>", "keep <ns>", "<unknown>"] }
        });
        let out = replace_vars(&params, &vars);
        assert_eq!(out["namespace"], "shop");
        assert_eq!(out["count"], 3);
        assert_eq!(out["nested"]["list"], json!(["shop", "keep <ns>", "<unknown>"]));
    }

    #[test]
    fn test_replace_vars_empty_map_is_identity() {
        let params = json!({ "a": "<x>", "b": [1, "<y>"], "c": null });
        assert_eq!(replace_vars(&params, &Map::new()), params);
    }

    #[test]
    fn test_placeholder_name() {
        assert_eq!(placeholder_name("<ns>"), Some("ns"));
        assert_eq!(placeholder_name("<>"), None);
        assert_eq!(placeholder_name("<a>b>"), None);
        assert_eq!(placeholder_name("ns"), None);
    }

    #[test]
    fn test_fallback_resource() {
        assert_eq!(fallback_resource("<ingressNamespace>"), "openshift-ingress");
        assert_eq!(fallback_resource("ingressControllerNamespace"), "openshift-ingress-operator");
        assert_eq!(fallback_resource("<ingressControllerName>"), "default");
        assert_eq!(fallback_resource("<pod>"), "");
    }

    struct Fixed(Vec<String>);

    #[async_trait]
    impl ResourceDiscoverer for Fixed {
        async fn discover(&self, _: &str, _: &Map<String, Value>) -> Result<Vec<String>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl ResourceDiscoverer for Failing {
        async fn discover(&self, _: &str, _: &Map<String, Value>) -> Result<Vec<String>> {
            Err(TriageError::Tool("api unavailable".into()))
        }
    }

    #[tokio::test]
    async fn test_resolve_placeholder() {
        let ctx = Map::new();
        let found = Fixed(vec!["router-a".into(), "router-b".into()]);
        assert_eq!(
            resolve_placeholder("<ingressNamespace>", &ctx, Some(&found as &dyn ResourceDiscoverer)).await,
            "router-a"
        );

        let empty = Fixed(vec![]);
        assert_eq!(
            resolve_placeholder("<ingressNamespace>", &ctx, Some(&empty as &dyn ResourceDiscoverer)).await,
            "openshift-ingress"
        );
        assert_eq!(
            resolve_placeholder("<ingressControllerName>", &ctx, Some(&Failing as &dyn ResourceDiscoverer)).await,
            "default"
        );
        assert_eq!(resolve_placeholder("<pod>", &ctx, None).await, "");
    }
}
