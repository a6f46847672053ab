//! MCP server over newline-delimited JSON-RPC
//!
//! Reads one message per line, handles requests strictly in order and writes
//! one response line per request. Notifications get no response. Logging must
//! go elsewhere (stderr) because the writer carries the protocol.
use super::types::*;
use crate::tools::ToolRegistry;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub struct McpServer {
    registry: ToolRegistry,
    info: ServerInfo,
}

impl McpServer {
    pub fn new(registry: ToolRegistry, info: ServerInfo) -> Self {
        Self { registry, info }
    }

    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Serve on the process's stdin/stdout until stdin closes.
    pub async fn serve_stdio(&self) -> Result<(), McpError> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.serve(stdin, tokio::io::stdout()).await
    }

    /// Serve until `reader` reaches EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(target: "mcp_server", server = %self.info.name, version = %self.info.version, "MCP server listening");
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_message(&line).await {
                let mut out = serde_json::to_string(&response)?;
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }

        info!(target: "mcp_server", "Input closed; MCP server stopping");
        Ok(())
    }

    /// Handle one raw message. Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let raw: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "mcp_server", error = %e, "Unparseable message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    McpError::Parse(e.to_string()).to_rpc_error(),
                ));
            }
        };

        let id = raw.get("id").cloned();
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    McpError::InvalidRequest(e.to_string()).to_rpc_error(),
                ));
            }
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                request.id.unwrap_or(Value::Null),
                McpError::InvalidRequest("jsonrpc must be \"2.0\"".to_string()).to_rpc_error(),
            ));
        }

        let Some(id) = request.id.clone() else {
            self.handle_notification(&request);
            return None;
        };

        debug!(target: "mcp_server", method = %request.method, "Handling request");
        let response = match self.dispatch(request).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                warn!(target: "mcp_server", code = e.code(), error = %e, "Request failed");
                JsonRpcResponse::failure(id, e.to_rpc_error())
            }
        };
        Some(response)
    }

    fn handle_notification(&self, request: &JsonRpcRequest) {
        match request.method.as_str() {
            "notifications/initialized" => {
                info!(target: "mcp_server", "Client initialized");
            }
            other => debug!(target: "mcp_server", method = %other, "Ignoring notification"),
        }
    }

    async fn dispatch(&self, request: JsonRpcRequest) -> Result<Value, McpError> {
        match request.method.as_str() {
            "initialize" => self.initialize(request.params),
            "ping" => Ok(json!({})),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params).await,
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: InitializeParams = match params {
            Some(p) => serde_json::from_value(p)
                .map_err(|e| McpError::InvalidParams(e.to_string()))?,
            None => InitializeParams::default(),
        };
        if let Some(client) = &params.client_info {
            info!(target: "mcp_server", client = %client.name, client_version = %client.version, "Client connected");
        }

        let result = InitializeResult {
            protocol_version: negotiate_protocol_version(params.protocol_version.as_deref())
                .to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
            },
            server_info: self.info.clone(),
        };
        Ok(serde_json::to_value(result)?)
    }

    fn list_tools(&self) -> Result<Value, McpError> {
        let tools: Vec<McpTool> = self
            .registry
            .list_tools()
            .into_iter()
            .map(|t| McpTool {
                name: t.name(),
                description: Some(t.description()),
                input_schema: t.parameters(),
            })
            .collect();
        Ok(serde_json::to_value(ListToolsResult {
            tools,
            next_cursor: None,
        })?)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, McpError> {
        let params: CallToolParams = params
            .ok_or_else(|| McpError::InvalidParams("Missing params".to_string()))
            .and_then(|p| {
                serde_json::from_value(p).map_err(|e| McpError::InvalidParams(e.to_string()))
            })?;

        if self.registry.get(&params.name).is_none() {
            return Err(McpError::InvalidParams(format!("Unknown tool: {}", params.name)));
        }

        info!(target: "mcp_server", tool = %params.name, "Tool called");
        let arguments = params.arguments.unwrap_or_else(|| json!({}));
        let (body, is_error) = match self.registry.call(&params.name, arguments).await {
            Ok(value) => (value, false),
            Err(e) => (
                json!({
                    "success": false,
                    "error": e.to_string(),
                    "code": e.code(),
                    "message": format!("Tool '{}' failed", params.name),
                }),
                true,
            ),
        };

        let text = serde_json::to_string_pretty(&body)?;
        Ok(serde_json::to_value(McpToolCall {
            content: vec![ToolContent::Text { text }],
            is_error: Some(is_error),
        })?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Tool, ToolError, ToolResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> String {
            "fail".into()
        }
        fn description(&self) -> String {
            "Always fails".into()
        }
        fn parameters(&self) -> Value {
            json!({"type": "object"})
        }
        async fn call(&self, _arguments: Value) -> ToolResult<Value> {
            Err(ToolError::InvalidArguments("bad".into()))
        }
    }

    async fn server() -> McpServer {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool)).await;
        McpServer::new(
            registry,
            ServerInfo {
                name: "openai-tts".into(),
                version: "test".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_initialize_and_notification() {
        let server = server().await;
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","capabilities":{},"clientInfo":{"name":"t","version":"1"}}}"#)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "openai-tts");
        assert!(result["capabilities"]["tools"].is_object());

        assert!(server
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server().await;
        let parse = server.handle_message("{not json").await.unwrap();
        assert_eq!(parse.error.unwrap().code, PARSE_ERROR);

        let unknown = server
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(unknown.id, json!("a"));
        assert_eq!(unknown.error.unwrap().code, METHOD_NOT_FOUND);

        let missing_tool = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"nope"}}"#)
            .await
            .unwrap();
        assert_eq!(missing_tool.error.unwrap().code, INVALID_PARAMS);

        let bad_version = server
            .handle_message(r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(bad_version.error.unwrap().code, INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tool_failure_is_error_result() {
        let server = server().await;
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":5,"method":"tools/call","params":{"name":"fail","arguments":{}}}"#)
            .await
            .unwrap();
        let result = resp.result.unwrap();
        assert_eq!(result["isError"], true);
        let body: Value =
            serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INVALID_ARGUMENTS");
    }

    #[tokio::test]
    async fn test_serve_writes_one_line_per_request() {
        let server = server().await;
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["result"]["tools"][0]["name"], "fail");
    }
}
