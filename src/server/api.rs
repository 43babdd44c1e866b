use axum::{
    body::{ to_bytes, Body, Bytes },
    extract::{ ConnectInfo, Request, State },
    http::{ header, HeaderMap, HeaderValue, StatusCode },
    response::{ sse::{ Event, KeepAlive, Sse }, IntoResponse, Response },
    routing::post,
    Json,
    Router,
};
use futures::StreamExt;
use log::{ debug, error, info, warn };
use serde::Serialize;
use serde_json::{ json, Value };
use std::any::Any as PanicPayload;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::catch_panic::{ CatchPanicLayer, ResponseForPanic };
use tower_http::cors::{ Any, CorsLayer };

use crate::analytics::{ AnalyticsStore, AnalyticsSubmission };
use crate::client_ip::get_client_ip;
use crate::config::GatewayConfig;
use crate::config::prompt::welcome_message;
use crate::feedback::{ FeedbackStore, FeedbackSubmission };
use crate::models::ErrorBody;
use crate::proxy::{ ChatProxy, ProxyError };
use crate::rate_limit::{ ChatRateLimiter, RateLimitDecision };
use crate::telemetry::ErrorReporter;
use crate::validation::{ validate_request, ValidationResult };

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub proxy: Arc<ChatProxy>,
    pub limiter: Arc<ChatRateLimiter>,
    pub feedback: Arc<FeedbackStore>,
    pub analytics: Arc<AnalyticsStore>,
    pub reporter: Arc<dyn ErrorReporter>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
    primary: bool,
    fallback: bool,
    welcome: String,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let reporter = Arc::clone(&state.reporter);

    let router = Router::new()
        .route("/api/chat", post(chat_handler).get(health_handler))
        .route("/api/chat/feedback", post(feedback_submit_handler).get(feedback_stats_handler))
        .route("/api/chat/analytics", post(analytics_track_handler).get(analytics_stats_handler))
        .with_state(state);

    with_panic_boundary(router, reporter).layer(cors)
}

/// Turns a handler panic into a generic 500 and reports it.
#[derive(Clone)]
struct PanicResponder {
    reporter: Arc<dyn ErrorReporter>,
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, payload: Box<dyn PanicPayload + Send + 'static>) -> Response<Body> {
        let details = if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else {
            "unknown panic".to_string()
        };
        let err = ProxyError::InternalError(format!("handler panicked: {}", details));
        error!("{}", err);
        self.reporter.capture(&err, &[("stage", "handler")]);
        err.into_response()
    }
}

fn with_panic_boundary(router: Router, reporter: Arc<dyn ErrorReporter>) -> Router {
    router.layer(CatchPanicLayer::custom(PanicResponder { reporter }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

async fn chat_handler(State(state): State<AppState>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = get_client_ip(request.headers(), peer, state.config.trust_proxy_headers);

    let decision = state.limiter.check_rate_limit(&ip);
    match &decision {
        RateLimitDecision::Limited { window, .. } => {
            warn!("Rate limited chat request ({} window)", window);
            return (ProxyError::RateLimited { retry_after: decision.retry_after_secs() }).into_response();
        }
        RateLimitDecision::Allowed { warning: Some(warning) } => {
            info!("{}", warning);
        }
        RateLimitDecision::Allowed { warning: None } => {}
    }

    let body = match to_bytes(request.into_body(), MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            debug!("Failed to read chat body: {}", e);
            return (ProxyError::InvalidRequest("Invalid request body".to_string())).into_response();
        }
    };
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (ProxyError::InvalidRequest("Invalid JSON body".to_string())).into_response();
        }
    };

    let chat_request = match validate_request(&value, &state.config.validation) {
        ValidationResult::Valid(req) => req,
        ValidationResult::Invalid(reason) => {
            debug!("Rejected chat request: {}", reason);
            return (ProxyError::InvalidRequest(reason)).into_response();
        }
    };

    let events = state.proxy.stream(chat_request).map(|chunk| Event::default().json_data(&chunk));

    let mut response = Sse::new(events).keep_alive(KeepAlive::default()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let primary = state.proxy.has_primary();
    let fallback = state.proxy.is_provider_configured();
    let configured = primary || fallback;

    Json(HealthResponse {
        status: if configured { "ok" } else { "not_configured" },
        message: if configured { "NEXI chat API is ready" } else { "AI provider not configured" },
        primary,
        fallback,
        welcome: welcome_message(state.proxy.get_portfolio_context()),
    })
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn feedback_submit_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let submission: FeedbackSubmission = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    match state.feedback.record(submission, user_agent(&headers)).await {
        Ok(id) => Json(json!({ "success": true, "id": id })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn feedback_stats_handler(State(state): State<AppState>) -> Response {
    Json(state.feedback.summary().await).into_response()
}

async fn analytics_track_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let submission: AnalyticsSubmission = match serde_json::from_slice(&body) {
        Ok(s) => s,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON body");
        }
    };

    match state.analytics.track(submission).await {
        Ok(id) => Json(json!({ "success": true, "id": id })).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
    }
}

async fn analytics_stats_handler(State(state): State<AppState>) -> Response {
    Json(state.analytics.summary().await).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelemetryConfig;
    use crate::config::prompt::ERROR_MESSAGES;
    use crate::telemetry::Telemetry;
    use axum::{ http::Request as HttpRequest, routing::get };
    use tower::ServiceExt;

    async fn explode() -> &'static str {
        panic!("boom")
    }

    #[tokio::test]
    async fn handler_panic_becomes_generic_500_and_is_reported() {
        let telemetry = Arc::new(
            Telemetry::new(
                &(TelemetryConfig { enabled: true, sample_rate: 1.0, environment: "test".into() })
            )
        );
        let reporter: Arc<dyn ErrorReporter> = telemetry.clone();
        let app = with_panic_boundary(Router::new().route("/explode", get(explode)), reporter);

        let resp = app
            .oneshot(HttpRequest::builder().uri("/explode").body(Body::empty()).unwrap()).await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({"success": false, "error": ERROR_MESSAGES.generic_error}));
        assert_eq!(telemetry.reported_count(), 1);
    }
}
