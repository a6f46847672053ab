use super::error::{ToolError, ToolResult};
use super::traits::Tool;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// A registry for managing available tools
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    call_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TOOL_TIMEOUT)
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        Self {
            tools: Arc::new(DashMap::new()),
            call_timeout,
        }
    }

    /// Register a new tool
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");

        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(target: "tool_registry", tool = %name, "Replaced existing tool");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    /// List all registered tools, sorted by name
    pub fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = self.tools.iter().map(|t| t.clone()).collect();
        tools.sort_by_key(|t| t.name());
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Call a tool by name with timeout
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn call(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> ToolResult<serde_json::Value> {
        let start_time = std::time::Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        // Execute tool with timeout
        let fut = tool.call(arguments);
        let result = match timeout(self.call_timeout, fut).await {
            Ok(res) => res,
            Err(_) => {
                warn!(target: "tool_registry", tool = %name, timeout_ms = self.call_timeout.as_millis() as u64, "Tool execution timed out");
                Err(ToolError::Timeout)
            }
        };

        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        match &result {
            Ok(_) => {
                debug!(target: "tool_registry", tool = %name, elapsed_ms, "Tool execution succeeded");
            }
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, error = %e, elapsed_ms, "Tool execution failed");
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> String {
            "echo".into()
        }
        fn description(&self) -> String {
            "Echo arguments".into()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, arguments: Value) -> ToolResult<Value> {
            Ok(arguments)
        }
    }

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn name(&self) -> String {
            "slow".into()
        }
        fn description(&self) -> String {
            "Sleeps".into()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> ToolResult<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        let out = registry.call("echo", json!({"a": 1})).await.unwrap();
        assert_eq!(out, json!({"a": 1}));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new();
        assert!(matches!(
            registry.call("missing", Value::Null).await,
            Err(ToolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_configurable() {
        let registry = ToolRegistry::with_timeout(Duration::from_millis(20));
        registry.register(Arc::new(SlowTool)).await;
        registry.register(Arc::new(EchoTool)).await;
        assert!(matches!(
            registry.call("slow", Value::Null).await,
            Err(ToolError::Timeout)
        ));
        assert_eq!(registry.call_timeout(), Duration::from_millis(20));

        let names: Vec<String> = registry.list_tools().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["echo", "slow"]);
    }
}
