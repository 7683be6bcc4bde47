use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use sekha_memory_llm::{
    BridgeModels, LlmBridge, LlmRuntime, OllamaConfig, OllamaRuntime, RuntimeError, SummaryLevel,
};
use serde_json::{Value, json};

struct Seen {
    request_line: String,
    body: Value,
}

fn read_request(stream: &mut TcpStream) -> Seen {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).expect("read");
        assert!(n > 0, "client closed early");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let len = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < len {
        let n = stream.read(&mut chunk).expect("read body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Seen {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    }
}

fn spawn_ollama(responses: Vec<(u16, Value)>) -> (String, Receiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let _ = tx.send(read_request(&mut stream));
            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
        }
    });
    (format!("http://{addr}"), rx)
}

fn runtime(url: &str) -> OllamaRuntime {
    OllamaRuntime::new(OllamaConfig::new(url)).expect("runtime")
}

#[tokio::test]
async fn embed_posts_model_and_input() {
    let (url, rx) = spawn_ollama(vec![(200, json!({"embeddings": [[0.5, -0.25]]}))]);
    let vector = runtime(&url)
        .embed("nomic-embed-text", "hello")
        .await
        .expect("vector");
    assert_eq!(vector, vec![0.5, -0.25]);

    let seen = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert!(seen.request_line.starts_with("POST /api/embed "));
    assert_eq!(
        seen.body,
        json!({"model": "nomic-embed-text", "input": "hello"})
    );
}

#[tokio::test]
async fn empty_embeddings_are_invalid() {
    let (url, _rx) = spawn_ollama(vec![(200, json!({"embeddings": []}))]);
    let err = runtime(&url).embed("m", "hello").await;
    assert!(matches!(err, Err(RuntimeError::InvalidResponse(_))));
}

#[tokio::test]
async fn generate_disables_streaming() {
    let (url, rx) = spawn_ollama(vec![(200, json!({"response": "done", "done": true}))]);
    let text = runtime(&url).generate("llama", "say done").await.expect("text");
    assert_eq!(text, "done");

    let seen = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert!(seen.request_line.starts_with("POST /api/generate "));
    assert_eq!(seen.body["stream"], json!(false));
    assert_eq!(seen.body["prompt"], "say done");
}

#[tokio::test]
async fn api_errors_carry_status() {
    let (url, _rx) = spawn_ollama(vec![(404, json!({"error": "model not found"}))]);
    let err = runtime(&url).generate("missing", "hi").await;
    assert!(matches!(err, Err(RuntimeError::Api { status: 404, .. })));
}

#[tokio::test]
async fn bridge_health_counts_models() {
    let (url, rx) = spawn_ollama(vec![(
        200,
        json!({"models": [{"name": "llama3.1:8b"}, {"name": "nomic-embed-text"}]}),
    )]);
    let bridge = LlmBridge::new(Arc::new(runtime(&url)), BridgeModels::default());
    let health = bridge.health().await;
    assert_eq!(health.status, "healthy");
    assert_eq!(health.model_count, 2);
    let seen = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert!(seen.request_line.starts_with("GET /api/tags "));
}

#[tokio::test]
async fn bridge_health_is_degraded_without_runtime() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let bridge = LlmBridge::new(
        Arc::new(runtime(&format!("http://{addr}"))),
        BridgeModels::default(),
    );
    let health = bridge.health().await;
    assert_eq!(health.status, "degraded");
    assert!(!health.is_healthy());
}

#[tokio::test]
async fn bridge_summary_goes_through_generate() {
    let (url, rx) = spawn_ollama(vec![(200, json!({"response": " Weekly recap. "}))]);
    let bridge = LlmBridge::new(Arc::new(runtime(&url)), BridgeModels::default());
    let out = bridge
        .summarize(&["day one".to_string()], SummaryLevel::Monthly, None, 300)
        .await
        .expect("summary");
    assert_eq!(out.summary, "Weekly recap.");
    assert_eq!(out.level, SummaryLevel::Monthly);

    let seen = rx.recv_timeout(Duration::from_secs(5)).expect("request");
    assert_eq!(seen.body["model"], BridgeModels::default().summarize);
    let prompt = seen.body["prompt"].as_str().unwrap_or_default();
    assert!(prompt.starts_with("Create an executive summary for the month."));
    assert!(prompt.contains("Maximum 300 words."));
}
