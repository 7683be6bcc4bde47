use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use sekha_memory_controller::{
    ApiSurface, ControllerConfig, ControllerGateway, GatewayError, HttpControllerGateway,
};
use sekha_memory_core::{
    ArgumentBag, ContextRequest, StatsRequest, validate_search, validate_store,
};
use serde_json::{Value, json};

const API_KEY: &str = "test_key_12345678901234567890123456789012";

struct Captured {
    head: String,
    body: String,
}

impl Captured {
    fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or("")
    }

    fn header(&self, name: &str) -> Option<String> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case(name)
                .then(|| v.trim().to_string())
        })
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body json")
    }
}

fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 1024];
    let header_end = loop {
        let n = stream.read(&mut chunk).expect("read request");
        assert!(n > 0, "client closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).expect("read body");
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Captured {
        head,
        body: String::from_utf8_lossy(&body).to_string(),
    }
}

/// Serves each canned `(status, body)` to one connection, in order, and forwards the
/// captured requests.
fn spawn_controller(responses: Vec<(u16, String)>) -> (String, Receiver<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake controller");
    let addr = listener.local_addr().expect("local addr");
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let captured = read_request(&mut stream);
            let _ = tx.send(captured);
            let response = format!(
                "HTTP/1.1 {status} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
        }
    });
    (format!("http://{addr}"), rx)
}

fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("reserve addr");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    format!("http://{addr}")
}

fn gateway(base_url: &str, surface: ApiSurface) -> HttpControllerGateway {
    let mut cfg = ControllerConfig::new(base_url, API_KEY);
    cfg.surface = surface;
    cfg.timeout = Duration::from_secs(5);
    HttpControllerGateway::new(cfg).expect("gateway")
}

#[tokio::test]
async fn store_posts_conversation_with_bearer_token() {
    let (url, rx) = spawn_controller(vec![(
        200,
        json!({"success": true, "data": {"conversation_id": "c-1", "message_count": 1}})
            .to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::McpProxy);
    let conversation = validate_store(
        &ArgumentBag::from_arguments(Some(json!({
            "label": "Standup",
            "folder": "/team",
            "messages": [{"role": "user", "content": "status?"}]
        })))
        .expect("args"),
    )
    .expect("valid conversation");

    let envelope = gw
        .store_conversation(&conversation)
        .await
        .expect("envelope");
    assert!(envelope.success);
    assert_eq!(
        envelope.data.as_ref().and_then(|d| d.get("conversation_id")),
        Some(&json!("c-1"))
    );

    let req = rx.recv_timeout(Duration::from_secs(5)).expect("captured");
    assert!(req.request_line().starts_with("POST /mcp/tools/memory_store "));
    assert_eq!(
        req.header("authorization"),
        Some(format!("Bearer {API_KEY}"))
    );
    assert_eq!(
        req.header("content-type").as_deref(),
        Some("application/json")
    );
    let body = req.json();
    assert_eq!(body["label"], "Standup");
    assert_eq!(body["messages"][0]["metadata"], json!({}));
    assert!(body.get("importance_score").is_none());
}

#[tokio::test]
async fn search_body_omits_absent_filters() {
    let (url, rx) = spawn_controller(vec![(
        200,
        json!({"success": true, "data": {"results": []}}).to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::McpProxy);
    let request = validate_search(
        &ArgumentBag::from_arguments(Some(json!({"query": "rust traits"}))).expect("args"),
    )
    .expect("valid");

    gw.search_memory(&request).await.expect("envelope");
    let req = rx.recv_timeout(Duration::from_secs(5)).expect("captured");
    assert_eq!(req.json(), json!({"query": "rust traits", "limit": 10}));
}

#[tokio::test]
async fn rest_surface_sends_stats_as_get_with_query() {
    let (url, rx) = spawn_controller(vec![(
        200,
        json!({"success": true, "data": {"total_conversations": 3}}).to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::RestV1);
    gw.get_stats(&StatsRequest {
        folder: Some("/work".to_string()),
    })
    .await
    .expect("envelope");

    let req = rx.recv_timeout(Duration::from_secs(5)).expect("captured");
    assert!(
        req.request_line()
            .starts_with("GET /api/v1/stats?folder=%2Fwork "),
        "unexpected request line: {}",
        req.request_line()
    );
}

#[tokio::test]
async fn rest_surface_fills_conversation_id_in_path() {
    let id = "123e4567-e89b-12d3-a456-426614174000";
    let (url, rx) = spawn_controller(vec![(
        200,
        json!({"success": true, "data": {}}).to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::RestV1);
    gw.get_context(&ContextRequest {
        conversation_id: id.to_string(),
    })
    .await
    .expect("envelope");

    let req = rx.recv_timeout(Duration::from_secs(5)).expect("captured");
    assert!(
        req.request_line()
            .starts_with(&format!("GET /api/v1/conversations/{id}"))
    );
}

#[tokio::test]
async fn non_success_status_is_an_api_error() {
    let (url, _rx) = spawn_controller(vec![(
        404,
        json!({"success": false, "error": "Conversation not found"}).to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::McpProxy);
    let err = gw
        .get_context(&ContextRequest {
            conversation_id: "123e4567-e89b-12d3-a456-426614174000".to_string(),
        })
        .await
        .expect_err("404");
    assert!(
        matches!(err, GatewayError::Api { status: 404, .. }),
        "unexpected error: {err:?}"
    );
    assert!(!err.is_transport());
    assert!(err.describe().contains("Conversation not found"));
}

#[tokio::test]
async fn unparsable_body_is_an_invalid_response() {
    let (url, _rx) = spawn_controller(vec![(200, "<html>oops</html>".to_string())]);
    let gw = gateway(&url, ApiSurface::McpProxy);
    let err = gw
        .call(sekha_memory_controller::Operation::Stats, json!({}))
        .await
        .expect_err("invalid");
    assert!(matches!(err, GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn envelope_is_returned_verbatim_on_failure() {
    let (url, _rx) = spawn_controller(vec![(
        200,
        json!({"success": false, "error": "quota exceeded"}).to_string(),
    )]);
    let gw = gateway(&url, ApiSurface::McpProxy);
    let env = gw.legacy_query("anything", 5).await.expect("envelope");
    assert!(!env.success);
    assert_eq!(env.error.as_deref(), Some("quota exceeded"));
}

#[tokio::test]
async fn connection_refused_is_a_transport_error() {
    let gw = gateway(&closed_port_url(), ApiSurface::McpProxy);
    let err = gw
        .get_stats(&StatsRequest::default())
        .await
        .expect_err("refused");
    assert!(err.is_transport());
}

#[tokio::test]
async fn slow_controller_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            thread::sleep(Duration::from_secs(3));
            drop(stream);
        }
    });

    let mut cfg = ControllerConfig::new(format!("http://{addr}"), API_KEY);
    cfg.timeout = Duration::from_millis(200);
    let gw = HttpControllerGateway::new(cfg).expect("gateway");
    let err = gw
        .get_stats(&StatsRequest::default())
        .await
        .expect_err("timeout");
    assert!(err.is_transport());
    assert!(err.describe().contains("timed out"));
}

#[tokio::test]
async fn health_reports_reachability() {
    let (url, rx) = spawn_controller(vec![(200, json!({"status": "ok"}).to_string())]);
    let status = gateway(&url, ApiSurface::McpProxy).check_health().await;
    assert_eq!(status.status, "healthy");
    assert!(status.is_healthy());
    let req = rx.recv_timeout(Duration::from_secs(5)).expect("captured");
    assert!(req.request_line().starts_with("GET /health "));

    let status = gateway(&closed_port_url(), ApiSurface::McpProxy)
        .check_health()
        .await;
    assert_eq!(status.status, "unhealthy");
    assert!(!status.controller_reachable);
    assert!(status.error.is_some());
}
