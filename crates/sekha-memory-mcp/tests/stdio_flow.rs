use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use serde_json::{json, Value};

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("reserve addr");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}")
}

fn spawn_daemon() -> Child {
    Command::new(env!("CARGO_BIN_EXE_sekha-memoryd"))
        .env("SEKHA_CONTROLLER_URL", closed_port_url())
        .env("SEKHA_CONTROLLER_API_KEY", "test-key")
        .env("SEKHA_REQUEST_TIMEOUT_SECS", "2")
        .env("OLLAMA_HOST", closed_port_url())
        .env("SEKHA_LOG_LEVEL", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn sekha-memoryd")
}

fn read_line_json(reader: &mut BufReader<ChildStdout>) -> Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(&line).expect("parse response json")
}

#[test]
fn line_delimited_session() {
    let mut child = spawn_daemon();
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    let requests = [
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "memory_search", "arguments": {"query": "   "}}
        }),
        json!({
            "jsonrpc": "2.0", "id": 4, "method": "tools/call",
            "params": {"name": "memory_stats", "arguments": {}}
        }),
    ];
    for req in &requests {
        writeln!(stdin, "{req}").expect("write request");
    }
    drop(stdin);

    let init = read_line_json(&mut reader);
    assert_eq!(init["id"], 1);
    assert_eq!(init["result"]["serverInfo"]["name"], "sekha-memory");

    let list = read_line_json(&mut reader);
    assert_eq!(list["id"], 2);
    assert_eq!(list["result"]["tools"].as_array().map(Vec::len), Some(7));

    let search = read_line_json(&mut reader);
    assert_eq!(search["id"], 3);
    assert_eq!(search["result"]["structuredContent"]["error_kind"], "validation");

    let stats = read_line_json(&mut reader);
    assert_eq!(stats["id"], 4);
    assert_eq!(stats["result"]["isError"], true);
    assert_eq!(stats["result"]["structuredContent"]["error_kind"], "transport");

    let status = child.wait().expect("wait child");
    assert!(status.success());
}

fn write_framed(stdin: &mut ChildStdin, payload: &Value) {
    let body = serde_json::to_vec(payload).expect("serialize payload");
    write!(stdin, "Content-Length: {}\r\n\r\n", body.len()).expect("write header");
    stdin.write_all(&body).expect("write body");
    stdin.flush().expect("flush");
}

fn read_framed(reader: &mut BufReader<ChildStdout>) -> Value {
    let mut content_length = None;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).expect("read header");
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((name, value)) = trimmed.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<usize>().ok();
            }
        }
    }
    let mut body = vec![0_u8; content_length.expect("content-length header")];
    reader.read_exact(&mut body).expect("read body");
    serde_json::from_slice(&body).expect("parse framed json")
}

#[test]
fn content_length_framed_session() {
    let mut child = spawn_daemon();
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    write_framed(
        &mut stdin,
        &json!({"jsonrpc": "2.0", "id": 10, "method": "ping"}),
    );
    let pong = read_framed(&mut reader);
    assert_eq!(pong["id"], 10);
    assert_eq!(pong["result"], json!({}));

    write_framed(
        &mut stdin,
        &json!({
            "jsonrpc": "2.0", "id": 11, "method": "tools/call",
            "params": {"name": "unknown_tool", "arguments": {}}
        }),
    );
    let unknown = read_framed(&mut reader);
    assert_eq!(unknown["error"]["code"], -32601);

    write_framed(
        &mut stdin,
        &json!({
            "jsonrpc": "2.0", "id": 12, "method": "tools/call",
            "params": {
                "name": "memory_export",
                "arguments": {"conversation_id": "123e4567-e89b-12d3-a456-426614174000", "format": "xml"}
            }
        }),
    );
    let export = read_framed(&mut reader);
    let text = export["result"]["content"][0]["text"].as_str().unwrap_or_default();
    assert!(text.contains("xml"));

    drop(stdin);
    let status = child.wait().expect("wait child");
    assert!(status.success());
}

#[test]
fn malformed_line_gets_parse_error() {
    let mut child = spawn_daemon();
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    writeln!(stdin, "{{not json").expect("write");
    drop(stdin);

    let response = read_line_json(&mut reader);
    assert_eq!(response["error"]["code"], -32700);
    assert!(response["id"].is_null());
    assert!(child.wait().expect("wait").success());
}

#[test]
fn oversized_frame_gets_parse_error_and_server_keeps_running() {
    let mut child = spawn_daemon();
    let mut stdin = child.stdin.take().expect("stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("stdout"));

    write!(stdin, "Content-Length: 99999999999\r\n\r\n").expect("write header");
    writeln!(stdin, "{}", json!({"jsonrpc": "2.0", "id": 21, "method": "ping"})).expect("write");
    drop(stdin);

    let refused = read_line_json(&mut reader);
    assert_eq!(refused["error"]["code"], -32700);
    assert!(refused["error"]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("exceeds limit"));

    let pong = read_line_json(&mut reader);
    assert_eq!(pong["id"], 21);
    assert!(child.wait().expect("wait").success());
}
