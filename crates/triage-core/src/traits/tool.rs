//! Tool execution collaborator

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Executes a diagnostic tool against the cluster.
///
/// Results are returned as raw JSON; textual output is carried as
/// `Value::String`. Timeouts and retries belong to the implementation.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, tool: &str, params: &Value) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoExecutor;

    #[async_trait]
    impl ToolExecutor for EchoExecutor {
        async fn execute(&self, tool: &str, params: &Value) -> Result<Value> {
            Ok(json!({ "tool": tool, "params": params }))
        }
    }

    #[tokio::test]
    async fn test_executor_object_safety() {
        let executor: Box<dyn ToolExecutor> = Box::new(EchoExecutor);
        let out = executor
            .execute("oc_read_get_pods", &json!({ "namespace": "ns" }))
            .await
            .unwrap();
        assert_eq!(out["tool"], "oc_read_get_pods");
        assert_eq!(out["params"]["namespace"], "ns");
    }
}
