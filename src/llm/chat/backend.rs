use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client as HttpClient;
use serde::Serialize;
use std::time::Duration;

use super::{ ChatClient, CompletionRequest, Payload, TokenStream, UpstreamError, send_streaming, token_stream };
use crate::models::{ ChatMessage, StreamChunk };

/// Primary path: the backend chat service, which builds its own prompt and
/// already speaks the gateway's chunk format.
pub struct BackendChatClient {
    http: HttpClient,
    base_url: String,
}

#[derive(Serialize)]
struct BackendRequest<'a> {
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
}

impl BackendChatClient {
    pub fn new(base_url: String, connect_timeout: Duration) -> Result<Self, UpstreamError> {
        let http = HttpClient::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self { http, base_url })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }
}

fn parse_backend_payload(data: &str) -> Payload {
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(StreamChunk::Content { content }) if content.is_empty() => Payload::Skip,
        Ok(StreamChunk::Content { content }) => Payload::Token(content),
        Ok(StreamChunk::Done) => Payload::End,
        Ok(StreamChunk::Error { error }) => Payload::Failed(error),
        Err(e) => {
            debug!("Skipping malformed backend chunk: {} ({})", data, e);
            Payload::Skip
        }
    }
}

#[async_trait]
impl ChatClient for BackendChatClient {
    fn name(&self) -> &str {
        "backend"
    }

    async fn stream_chat(&self, request: &CompletionRequest) -> Result<TokenStream, UpstreamError> {
        let url = self.chat_url();
        let body = BackendRequest {
            messages: &request.messages,
            session_id: request.session_id.as_deref(),
        };

        info!("Starting backend stream request to {}", url);
        let req = self.http
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        let resp = send_streaming(self.name(), req).await?;

        Ok(token_stream(resp, parse_backend_payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_backend_chunks() {
        assert_eq!(
            parse_backend_payload(r#"{"type":"content","content":"Hi"}"#),
            Payload::Token("Hi".into())
        );
        assert_eq!(parse_backend_payload(r#"{"type":"content","content":""}"#), Payload::Skip);
        assert_eq!(parse_backend_payload(r#"{"type":"done"}"#), Payload::End);
        assert_eq!(
            parse_backend_payload(r#"{"type":"error","error":"nope"}"#),
            Payload::Failed("nope".into())
        );
        assert_eq!(parse_backend_payload("garbage"), Payload::Skip);
    }

    #[test]
    fn chat_url_joins_cleanly() {
        let client = BackendChatClient::new("http://svc:8000/".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(client.chat_url(), "http://svc:8000/chat");
    }
}
