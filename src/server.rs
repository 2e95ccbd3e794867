/// Server Module
///
/// Stdio host: newline-delimited JSON-RPC 2.0 carrying the MCP tool methods.
///
/// Each line on stdin is one request or notification; each response is
/// written as one line on stdout. Requests are handled one at a time.

use crate::core::Result;
use crate::tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";
pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

impl Response {
    fn result(id: Value, result: Value) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Response {
            jsonrpc: JSONRPC_VERSION,
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// The tool server.
pub struct Server {
    registry: ToolRegistry,
    name: String,
}

impl Server {
    pub fn new(registry: ToolRegistry, name: impl Into<String>) -> Self {
        Server {
            registry,
            name: name.into(),
        }
    }

    /// Handles one line of input. Returns the response to write, or None for
    /// notifications and blank lines.
    pub async fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Unparseable request: {}", e);
                return Some(to_value(Response::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e))));
            }
        };
        let request: Request = match serde_json::from_value(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = raw.get("id").cloned().unwrap_or(Value::Null);
                return Some(to_value(Response::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))));
            }
        };

        let Some(id) = request.id.clone() else {
            debug!("Notification: {}", request.method);
            return None;
        };
        Some(to_value(self.handle_request(id, request).await))
    }

    async fn handle_request(&self, id: Value, request: Request) -> Response {
        match request.method.as_str() {
            "initialize" => Response::result(
                id,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": { "tools": { "listChanged": false } },
                    "serverInfo": { "name": self.name, "version": env!("CARGO_PKG_VERSION") },
                }),
            ),
            "ping" => Response::result(id, json!({})),
            "tools/list" => Response::result(id, json!({ "tools": self.registry.definitions() })),
            "tools/call" => {
                let params: CallParams = match serde_json::from_value(request.params) {
                    Ok(params) => params,
                    Err(e) => {
                        return Response::error(id, INVALID_PARAMS, format!("Invalid params: {}", e));
                    }
                };
                let envelope = self.registry.call(&params.name, &params.arguments).await;
                let text = envelope.to_json().to_string();
                Response::result(
                    id,
                    json!({
                        "content": [{ "type": "text", "text": text }],
                        "isError": !envelope.is_success(),
                    }),
                )
            }
            other => Response::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
        }
    }

    /// Serves requests from `reader` until end of input, writing responses to `writer`.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(response) = self.handle_line(&line).await {
                writer.write_all(response.to_string().as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }
        info!("Input closed, shutting down");
        Ok(())
    }

    /// Serves over the process's stdin and stdout.
    pub async fn serve_stdio(&self) -> Result<()> {
        info!("Starting {} with stdio transport", self.name);
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }
}

fn to_value(response: Response) -> Value {
    serde_json::to_value(response).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::Config;
    use crate::test_utils::ScriptedEngine;
    use std::sync::Arc;

    fn server(engine: &ScriptedEngine) -> Server {
        let catalog = Catalog::new(Arc::new(engine.clone()), &Config::default()).unwrap();
        Server::new(ToolRegistry::new(Arc::new(catalog)), "MySQL Admin Server")
    }

    #[tokio::test]
    async fn test_initialize_and_list() {
        let server = server(&ScriptedEngine::new());

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response["result"]["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(response["result"]["serverInfo"]["name"], "MySQL Admin Server");

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        assert_eq!(response["result"]["tools"].as_array().unwrap().len(), 30);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let server = server(&ScriptedEngine::new());
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_none());
        assert!(server.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let server = server(&ScriptedEngine::new());

        let response = server.handle_line("{not json").await.unwrap();
        assert_eq!(response["error"]["code"], PARSE_ERROR);
        assert_eq!(response["id"], Value::Null);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#)
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
        assert_eq!(response["id"], 3);

        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{}}"#)
            .await
            .unwrap();
        assert_eq!(response["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_tool_call_wraps_envelope() {
        let server = server(&ScriptedEngine::new());
        let response = server
            .handle_line(r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"list_tables"}}"#)
            .await
            .unwrap();

        assert_eq!(response["result"]["isError"], true);
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        let envelope: Value = serde_json::from_str(text).unwrap();
        assert_eq!(envelope["status"], "error");
        assert_eq!(envelope["error"], "No database selected");
    }

    #[tokio::test]
    async fn test_serve_writes_one_line_per_request() {
        let server = server(&ScriptedEngine::new());
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"get_current_database","arguments":{}}}"#,
            "\n",
        );
        let mut output = Vec::new();
        server.serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"], json!({}));
        assert_eq!(lines[1]["result"]["isError"], false);
    }
}
