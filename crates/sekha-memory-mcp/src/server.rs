use std::io::{self, BufRead, Write};
use std::sync::Arc;

use sekha_memory_controller::ControllerGateway;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::config::ServerConfig;
use crate::protocol::{
    requested_protocol_version, JsonRpcRequest, JsonRpcResponse, ToolsCallParams,
    INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::tools::{RegistryError, ToolOutput, ToolRegistry};

/// Largest `Content-Length` body accepted on stdio.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Synchronous JSON-RPC front end. Requests are handled one at a time; tool calls run
/// to completion on the server's own Tokio runtime.
pub struct McpServer {
    name: String,
    version: String,
    registry: ToolRegistry,
    runtime: Runtime,
}

impl McpServer {
    pub fn new(config: &ServerConfig, gateway: Arc<dyn ControllerGateway>) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sekha-mcp")
            .enable_all()
            .build()?;
        Ok(Self {
            name: config.server_name.clone(),
            version: config.server_version.clone(),
            registry: ToolRegistry::new(gateway),
            runtime,
        })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Runs a future on the server runtime. Must not be called from async context.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                INVALID_REQUEST,
                "invalid jsonrpc version",
            ));
        }

        // Notifications never get a response, known or not.
        if request.is_notification() {
            debug!(method = %request.method, "notification received");
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => {
                let protocol_version = requested_protocol_version(&request.params);
                JsonRpcResponse::success(
                    id,
                    json!({
                        "protocolVersion": protocol_version,
                        "serverInfo": {"name": self.name, "version": self.version},
                        "capabilities": {
                            "tools": {"listChanged": false}
                        }
                    }),
                )
            }
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({"tools": self.registry.list()})),
            "tools/call" => self.handle_tools_call(id, request.params),
            _ => JsonRpcResponse::error(id, METHOD_NOT_FOUND, "method not found"),
        };
        Some(response)
    }

    fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let parsed: ToolsCallParams = match serde_json::from_value(params) {
            Ok(v) => v,
            Err(err) => {
                return JsonRpcResponse::error(id, INVALID_PARAMS, format!("invalid params: {err}"));
            }
        };

        match self
            .runtime
            .block_on(self.registry.call(&parsed.name, parsed.arguments))
        {
            Ok(output) => JsonRpcResponse::success(id, tool_result(&output)),
            Err(err @ RegistryError::UnknownTool(_)) => {
                warn!(tool = %parsed.name, "unknown tool requested");
                JsonRpcResponse::error(id, METHOD_NOT_FOUND, err.to_string())
            }
        }
    }

    pub fn serve_stdio(&self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut reader = io::BufReader::new(stdin.lock());
        let mut stdout = io::stdout();
        self.serve(&mut reader, &mut stdout)
    }

    /// Reads requests until EOF. Each request may be a single JSON line or a
    /// `Content-Length` framed body; the reply uses the same framing.
    pub fn serve<R: BufRead, W: Write>(&self, reader: &mut R, writer: &mut W) -> io::Result<()> {
        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }

            let trimmed = line.trim_end_matches(['\r', '\n']).trim_start();
            if trimmed.is_empty() {
                continue;
            }

            let (payload, frame) = if is_header_line(trimmed) {
                let content_length = match read_content_length(reader, trimmed) {
                    Ok(v) => v,
                    Err(err) => {
                        let response = JsonRpcResponse::error(
                            Value::Null,
                            PARSE_ERROR,
                            format!("invalid stdio frame: {err}"),
                        );
                        write_response(writer, &response, Frame::LineDelimited)?;
                        continue;
                    }
                };
                let mut body = vec![0_u8; content_length];
                if let Err(err) = reader.read_exact(&mut body) {
                    let response = JsonRpcResponse::error(
                        Value::Null,
                        PARSE_ERROR,
                        format!("invalid stdio frame body: {err}"),
                    );
                    write_response(writer, &response, Frame::ContentLength)?;
                    continue;
                }
                (body, Frame::ContentLength)
            } else {
                (trimmed.as_bytes().to_vec(), Frame::LineDelimited)
            };

            let request: JsonRpcRequest = match serde_json::from_slice(&payload) {
                Ok(v) => v,
                Err(err) => {
                    let response =
                        JsonRpcResponse::error(Value::Null, PARSE_ERROR, format!("parse error: {err}"));
                    write_response(writer, &response, frame)?;
                    continue;
                }
            };

            if let Some(response) = self.handle_request(request) {
                write_response(writer, &response, frame)?;
            }
        }
        Ok(())
    }
}

/// MCP `tools/call` result: text content plus a machine-readable status.
fn tool_result(output: &ToolOutput) -> Value {
    let content: Vec<Value> = output
        .segments()
        .iter()
        .map(|text| json!({"type": "text", "text": text}))
        .collect();
    let mut structured = json!({
        "status": if output.is_error() { "error" } else { "ok" }
    });
    if let (Some(kind), Some(obj)) = (output.failure_kind(), structured.as_object_mut()) {
        obj.insert("error_kind".to_string(), json!(kind.as_str()));
    }
    json!({
        "content": content,
        "isError": output.is_error(),
        "structuredContent": structured
    })
}

#[derive(Clone, Copy)]
enum Frame {
    LineDelimited,
    ContentLength,
}

fn write_response<W: Write>(
    writer: &mut W,
    response: &JsonRpcResponse,
    frame: Frame,
) -> io::Result<()> {
    match frame {
        Frame::LineDelimited => {
            let serialized = serde_json::to_string(response)?;
            writeln!(writer, "{serialized}")?;
        }
        Frame::ContentLength => {
            let serialized = serde_json::to_vec(response)?;
            write!(writer, "Content-Length: {}\r\n\r\n", serialized.len())?;
            writer.write_all(&serialized)?;
        }
    }
    writer.flush()
}

fn is_header_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.starts_with("content-length:") || lower.starts_with("content-type:")
}

/// Reads the remaining frame headers and returns the body length, which must not
/// exceed [`MAX_FRAME_BYTES`].
fn read_content_length<R: BufRead>(reader: &mut R, first_line: &str) -> io::Result<usize> {
    let mut content_length = parse_content_length(first_line);
    let mut header_line = String::new();
    loop {
        header_line.clear();
        if reader.read_line(&mut header_line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "unexpected eof while reading frame headers",
            ));
        }
        let trimmed = header_line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(v) = parse_content_length(trimmed) {
            content_length = Some(v);
        }
    }
    let content_length = content_length
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing content-length header"))?;
    if content_length > MAX_FRAME_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("content-length {content_length} exceeds limit of {MAX_FRAME_BYTES} bytes"),
        ));
    }
    Ok(content_length)
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case("content-length") {
        return None;
    }
    value.trim().parse::<usize>().ok()
}
