//! Model Context Protocol (MCP) server
//!
//! Exposes the tool registry to MCP clients over stdio.
//!
//! MCP Protocol Spec: https://spec.modelcontextprotocol.io/specification/
//!
//! Architecture:
//! - `server`: JSON-RPC request loop and method dispatch
//! - `types`: MCP protocol types (JSON-RPC 2.0 based)
pub mod server;
pub mod types;

pub use server::McpServer;
pub use types::{
    JsonRpcError, JsonRpcRequest, JsonRpcResponse, McpError, McpTool, McpToolCall, ServerInfo,
    ToolContent, DEFAULT_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
