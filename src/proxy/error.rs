use axum::{
    http::{ header, HeaderValue, StatusCode },
    response::{ IntoResponse, Response },
    Json,
};
use thiserror::Error;

use crate::config::prompt::ERROR_MESSAGES;
use crate::llm::chat::UpstreamError;
use crate::models::ErrorBody;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("rate limit exceeded")]
    RateLimited {
        retry_after: Option<u64>,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("no upstream available")]
    UpstreamUnavailable,
    #[error("upstream failed mid-stream: {0}")]
    UpstreamFailedMidStream(#[source] UpstreamError),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::UpstreamFailedMidStream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text safe to show a visitor.
    pub fn client_message(&self) -> String {
        match self {
            ProxyError::RateLimited { .. } => ERROR_MESSAGES.rate_limited.to_string(),
            ProxyError::InvalidRequest(reason) => reason.clone(),
            ProxyError::UpstreamUnavailable => ERROR_MESSAGES.provider_unavailable.to_string(),
            ProxyError::UpstreamFailedMidStream(UpstreamError::IdleTimeout(_)) => {
                ERROR_MESSAGES.upstream_timeout.to_string()
            }
            ProxyError::UpstreamFailedMidStream(_) | ProxyError::InternalError(_) => {
                ERROR_MESSAGES.generic_error.to_string()
            }
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), Json(ErrorBody::new(self.client_message()))).into_response();
        if let ProxyError::RateLimited { retry_after: Some(secs) } = &self {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
