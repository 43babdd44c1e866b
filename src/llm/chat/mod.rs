pub mod backend;
pub mod openai;

use async_trait::async_trait;
use futures::stream::{ self, Stream, StreamExt };
use log::error;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::ProviderConfig;
use crate::models::ChatMessage;
use self::backend::BackendChatClient;
use self::openai::OpenAIChatClient;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("upstream reported an error: {0}")]
    Upstream(String),
    #[error("timed out establishing connection after {0:?}")]
    ConnectTimeout(Duration),
    #[error("no chunk received within {0:?}")]
    IdleTimeout(Duration),
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub system_prompt: Option<String>,
    pub session_id: Option<String>,
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, UpstreamError>> + Send>>;

#[async_trait]
pub trait ChatClient: Send + Sync {
    fn name(&self) -> &str;

    /// Resolves once the upstream accepted the request with a 2xx status.
    /// Dropping the returned stream releases the connection.
    async fn stream_chat(&self, request: &CompletionRequest) -> Result<TokenStream, UpstreamError>;
}

/// What a single SSE `data:` payload means to the relay.
#[derive(Debug, PartialEq, Eq)]
pub enum Payload {
    Token(String),
    Skip,
    End,
    Failed(String),
}

pub(crate) async fn send_streaming(
    name: &str,
    request: reqwest::RequestBuilder
) -> Result<reqwest::Response, UpstreamError> {
    let resp = request.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        error!("{} error ({}): {}", name, status, body);
        return Err(UpstreamError::Status { status: status.as_u16(), body });
    }
    Ok(resp)
}

pub(crate) fn token_stream(resp: reqwest::Response, parse: fn(&str) -> Payload) -> TokenStream {
    let payloads = Box::pin(super::sse::data_payloads(Box::pin(resp.bytes_stream())));
    tokens_from_payloads(payloads, parse)
}

pub(crate) fn tokens_from_payloads<S, E>(payloads: S, parse: fn(&str) -> Payload) -> TokenStream
    where S: Stream<Item = Result<String, E>> + Send + Unpin + 'static, E: Into<UpstreamError> + Send + 'static
{
    Box::pin(
        stream::unfold(Some(payloads), move |state| async move {
            let mut payloads = match state {
                Some(p) => p,
                None => {
                    return None;
                }
            };
            loop {
                match payloads.next().await {
                    Some(Ok(data)) =>
                        match parse(&data) {
                            Payload::Token(token) => {
                                return Some((Ok(token), Some(payloads)));
                            }
                            Payload::Skip => {
                                continue;
                            }
                            Payload::End => {
                                return None;
                            }
                            Payload::Failed(msg) => {
                                return Some((Err(UpstreamError::Upstream(msg)), None));
                            }
                        }
                    Some(Err(e)) => {
                        return Some((Err(e.into()), None));
                    }
                    None => {
                        return None;
                    }
                }
            }
        })
    )
}

pub struct Upstreams {
    pub primary: Option<Arc<dyn ChatClient>>,
    pub fallback: Option<Arc<dyn ChatClient>>,
}

pub fn new_clients(config: &ProviderConfig, connect_timeout: Duration) -> Result<Upstreams, UpstreamError> {
    let primary: Option<Arc<dyn ChatClient>> = match &config.backend_url {
        Some(url) => Some(Arc::new(BackendChatClient::new(url.clone(), connect_timeout)?)),
        None => None,
    };
    let fallback: Option<Arc<dyn ChatClient>> = match &config.provider {
        Some(provider) if config.is_provider_configured() =>
            Some(Arc::new(OpenAIChatClient::from_config(provider, connect_timeout)?)),
        _ => None,
    };
    Ok(Upstreams { primary, fallback })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> Payload {
        match data {
            "end" => Payload::End,
            "skip" => Payload::Skip,
            "fail" => Payload::Failed("bad".into()),
            other => Payload::Token(other.to_string()),
        }
    }

    async fn collect(items: Vec<&'static str>) -> Vec<Result<String, String>> {
        let payloads = stream::iter(
            items.into_iter().map(|s| Ok::<_, UpstreamError>(s.to_string()))
        );
        tokens_from_payloads(payloads, parse)
            .map(|r| r.map_err(|e| e.to_string()))
            .collect().await
    }

    #[tokio::test]
    async fn stops_at_end_marker() {
        let out = collect(vec!["a", "skip", "b", "end", "c"]).await;
        assert_eq!(out, vec![Ok("a".to_string()), Ok("b".to_string())]);
    }

    #[tokio::test]
    async fn failure_is_terminal() {
        let out = collect(vec!["a", "fail", "b"]).await;
        assert_eq!(out.len(), 2);
        assert!(out[1].as_ref().unwrap_err().contains("bad"));
    }
}
