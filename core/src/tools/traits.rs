use super::error::ToolResult;
use async_trait::async_trait;
use serde_json::Value;

/// An operation the TTS server offers over MCP `tools/call`
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name clients call the tool by, e.g. "generate_speech" or "resize_cache"
    fn name(&self) -> String;

    /// One-line summary shown in `tools/list`
    fn description(&self) -> String;

    /// JSON Schema of the `arguments` object, sent as `inputSchema`
    fn parameters(&self) -> Value;

    /// Run with the client's `arguments`; an `Err` becomes an `isError` result
    async fn call(&self, arguments: Value) -> ToolResult<Value>;
}
