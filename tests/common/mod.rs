#![allow(dead_code)]

use axum::{
    body::{ to_bytes, Body },
    extract::State,
    http::{ header, Request, StatusCode },
    response::{ IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use clap::Parser;
use nexi_gateway::{
    analytics::AnalyticsStore,
    cli::Args,
    config::GatewayConfig,
    feedback::FeedbackStore,
    llm::chat::new_clients,
    portfolio::load_portfolio_context,
    proxy::ChatProxy,
    rate_limit::ChatRateLimiter,
    server::{ build_router, AppState },
    telemetry::Telemetry,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// A fake upstream on an ephemeral port that replays a fixed SSE body.
pub struct MockUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    last_body: Arc<tokio::sync::Mutex<Option<Value>>>,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
struct MockState {
    hits: Arc<AtomicUsize>,
    last_body: Arc<tokio::sync::Mutex<Option<Value>>>,
    status: StatusCode,
    sse_body: Arc<String>,
}

async fn replay(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().await = Some(body);
    if !state.status.is_success() {
        return (state.status, "mock upstream failure").into_response();
    }
    ([(header::CONTENT_TYPE, "text/event-stream")], state.sse_body.as_str().to_string()).into_response()
}

impl MockUpstream {
    pub async fn start(route: &str, status: StatusCode, sse_body: String) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_body = Arc::new(tokio::sync::Mutex::new(None));
        let state = MockState {
            hits: hits.clone(),
            last_body: last_body.clone(),
            status,
            sse_body: Arc::new(sse_body),
        };
        let app = Router::new().route(route, post(replay)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits, last_body, handle }
    }

    /// Backend speaking the gateway chunk format on `/chat`.
    pub async fn backend(tokens: &[&str]) -> Self {
        let mut body = String::new();
        for t in tokens {
            body.push_str(&format!("data: {}\n\n", serde_json::json!({"type": "content", "content": t})));
        }
        body.push_str("data: {\"type\":\"done\"}\n\n");
        Self::start("/chat", StatusCode::OK, body).await
    }

    pub async fn failing_backend() -> Self {
        Self::start("/chat", StatusCode::INTERNAL_SERVER_ERROR, String::new()).await
    }

    /// OpenAI-compatible provider on `/chat/completions`.
    pub async fn provider(tokens: &[&str]) -> Self {
        let mut body = String::from("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\r\n\r\n");
        for t in tokens {
            body.push_str(
                &format!("data: {}\n\n", serde_json::json!({"choices": [{"delta": {"content": t}}]}))
            );
        }
        body.push_str("data: [DONE]\n\n");
        Self::start("/chat/completions", StatusCode::OK, body).await
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub async fn last_body(&self) -> Option<Value> {
        self.last_body.lock().await.clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn test_app(flags: &[&str]) -> Router {
    let mut argv = vec!["nexi-gateway", "--upstream-connect-timeout-secs", "2", "--upstream-idle-timeout-secs", "5"];
    argv.extend_from_slice(flags);
    let args = Args::parse_from(argv);
    let config = Arc::new(GatewayConfig::from_args(&args).unwrap());

    let upstreams = new_clients(&config.provider, config.timeouts.connect).unwrap();
    let reporter = Arc::new(Telemetry::disabled());
    let proxy = ChatProxy::new(
        upstreams,
        Arc::new(load_portfolio_context(None).unwrap()),
        config.timeouts,
        reporter.clone()
    );

    build_router(AppState {
        limiter: Arc::new(ChatRateLimiter::new(config.rate_limits)),
        config,
        proxy: Arc::new(proxy),
        feedback: Arc::new(FeedbackStore::default()),
        analytics: Arc::new(AnalyticsStore::default()),
        reporter,
    })
}

pub fn json_request(method: &str, uri: &str, body: Value, ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", ip)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

pub async fn body_json(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `data:` payload of an SSE body, parsed as JSON.
pub async fn sse_events(resp: Response) -> Vec<Value> {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

pub fn concat_content(events: &[Value]) -> String {
    events
        .iter()
        .filter(|e| e["type"] == "content")
        .filter_map(|e| e["content"].as_str())
        .collect()
}
