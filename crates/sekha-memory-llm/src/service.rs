//! HTTP front end for [`LlmBridge`]. One request per connection, handled in accept
//! order; bridge futures run on the service's own Tokio runtime.

use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use crate::bridge::{DEFAULT_SUMMARY_WORDS, LlmBridge};
use crate::error::BridgeError;
use crate::types::SummaryLevel;

/// Largest request body accepted. Bigger bodies are answered with 413 unread.
pub const MAX_REQUEST_BYTES: usize = 8 * 1024 * 1024;
pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:5001";

#[derive(Debug, Deserialize)]
struct EmbedBody {
    text: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SummarizeBody {
    messages: Vec<String>,
    level: SummaryLevel,
    #[serde(default)]
    model: Option<String>,
    #[serde(default = "default_summary_words")]
    max_words: u32,
}

#[derive(Debug, Deserialize)]
struct ScoreBody {
    message: String,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EntitiesBody {
    text: String,
    #[serde(default)]
    entity_types: Vec<String>,
    #[serde(default)]
    model: Option<String>,
}

fn default_summary_words() -> u32 {
    DEFAULT_SUMMARY_WORDS
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

impl HttpReply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn detail(status: u16, detail: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({"detail": detail.into()}),
        }
    }
}

pub struct BridgeService {
    bridge: LlmBridge,
    runtime: Runtime,
}

impl BridgeService {
    pub fn new(bridge: LlmBridge) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("sekha-llm-bridge")
            .enable_all()
            .build()?;
        Ok(Self { bridge, runtime })
    }

    pub fn bridge(&self) -> &LlmBridge {
        &self.bridge
    }

    /// Runs a future on the service runtime. Must not be called from async context.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn serve_http(&self, addr: &str) -> io::Result<()> {
        self.serve_listener(TcpListener::bind(addr)?)
    }

    pub fn serve_listener(&self, listener: TcpListener) -> io::Result<()> {
        info!(addr = %listener.local_addr()?, "llm bridge listening");
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    if let Err(err) = self.handle_connection(stream) {
                        warn!(error = %err, "llm bridge request error");
                    }
                }
                Err(err) => warn!(error = %err, "llm bridge accept error"),
            }
        }
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> io::Result<()> {
        let reply = match read_request(&stream)? {
            None => return Ok(()),
            Some(Incoming::TooLarge(len)) => HttpReply::detail(
                413,
                format!("request body of {len} bytes exceeds limit of {MAX_REQUEST_BYTES} bytes"),
            ),
            Some(Incoming::Request(req)) => self.handle(&req.method, &req.path, &req.body),
        };
        write_reply(&mut stream, &reply)
    }

    /// Routes one request. Bad input answers 422, runtime failures 500.
    pub fn handle(&self, method: &str, path: &str, body: &[u8]) -> HttpReply {
        debug!(%method, %path, bytes = body.len(), "llm bridge request");
        let route = path.split('?').next().unwrap_or(path);
        let known = matches!(
            route,
            "/health" | "/embed" | "/summarize" | "/score_importance" | "/extract_entities"
        );
        if !known {
            return HttpReply::detail(404, "Not Found");
        }
        let expected = if route == "/health" { "GET" } else { "POST" };
        if !method.eq_ignore_ascii_case(expected) {
            return HttpReply::detail(405, "Method Not Allowed");
        }

        match route {
            "/health" => to_reply(Ok(self.block_on(self.bridge.health()))),
            "/embed" => match parse::<EmbedBody>(body) {
                Ok(req) => to_reply(
                    self.block_on(self.bridge.embed(&req.text, req.model.as_deref())),
                ),
                Err(reply) => reply,
            },
            "/summarize" => match parse::<SummarizeBody>(body) {
                Ok(req) => to_reply(self.block_on(self.bridge.summarize(
                    &req.messages,
                    req.level,
                    req.model.as_deref(),
                    req.max_words,
                ))),
                Err(reply) => reply,
            },
            "/score_importance" => match parse::<ScoreBody>(body) {
                Ok(req) => to_reply(self.block_on(self.bridge.score_importance(
                    &req.message,
                    req.context.as_deref(),
                    req.model.as_deref(),
                ))),
                Err(reply) => reply,
            },
            _ => match parse::<EntitiesBody>(body) {
                Ok(req) => to_reply(self.block_on(self.bridge.extract_entities(
                    &req.text,
                    &req.entity_types,
                    req.model.as_deref(),
                ))),
                Err(reply) => reply,
            },
        }
    }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpReply> {
    serde_json::from_slice(body)
        .map_err(|err| HttpReply::detail(422, format!("invalid request body: {err}")))
}

fn to_reply<T: serde::Serialize>(result: Result<T, BridgeError>) -> HttpReply {
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(body) => HttpReply::ok(body),
            Err(err) => HttpReply::detail(500, err.to_string()),
        },
        Err(err @ BridgeError::Validation { .. }) => HttpReply::detail(422, err.to_string()),
        Err(BridgeError::Runtime(err)) => {
            error!(error = %err, "llm bridge operation failed");
            HttpReply::detail(500, err.to_string())
        }
    }
}

struct RawRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}

enum Incoming {
    Request(RawRequest),
    TooLarge(usize),
}

fn read_request(stream: &TcpStream) -> io::Result<Option<Incoming>> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let first = line.trim_end_matches(['\r', '\n']);
    if first.is_empty() {
        return Ok(None);
    }
    let mut parts = first.split_whitespace();
    let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "invalid http request line",
        ));
    };

    let mut headers = HashMap::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Ok(Some(Incoming::TooLarge(content_length)));
    }
    let mut body = vec![0_u8; content_length];
    if content_length > 0 {
        io::Read::read_exact(&mut reader, &mut body)?;
    }
    Ok(Some(Incoming::Request(RawRequest {
        method: method.to_string(),
        path: path.to_string(),
        body,
    })))
}

fn write_reply(stream: &mut TcpStream, reply: &HttpReply) -> io::Result<()> {
    let body = serde_json::to_vec(&reply.body)?;
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        reply.status,
        reason_phrase(reply.status),
        body.len()
    );
    stream.write_all(head.as_bytes())?;
    stream.write_all(&body)?;
    stream.flush()
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        422 => "Unprocessable Entity",
        _ => "Internal Server Error",
    }
}
