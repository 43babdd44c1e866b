use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::time::Duration;

use super::{ ChatClient, CompletionRequest, Payload, TokenStream, UpstreamError, send_streaming, token_stream };
use crate::llm::LlmConfig;
use crate::models::Role;

/// Fallback path: any OpenAI-compatible chat completions API (OpenAI, Groq).
pub struct OpenAIChatClient {
    http: HttpClient,
    name: String,
    model: String,
    base_url: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIStreamError>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamError {
    message: String,
}

impl OpenAIChatClient {
    pub fn from_config(config: &LlmConfig, connect_timeout: Duration) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e|
            UpstreamError::Upstream(format!("Invalid API key format: {}", e))
        )?;
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            http,
            name: config.llm_type.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(&self, request: &CompletionRequest) -> OpenAIChatRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(OpenAIMessage { role: Role::System.to_string(), content: system.clone() });
        }
        messages.extend(
            request.messages.iter().map(|m| OpenAIMessage {
                role: m.role.to_string(),
                content: m.content.clone(),
            })
        );

        OpenAIChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        }
    }
}

fn parse_openai_payload(data: &str) -> Payload {
    if data.trim() == "[DONE]" {
        return Payload::End;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return Payload::Failed(err.message);
            }
            match resp.choices.into_iter().next().and_then(|c| c.delta.content) {
                Some(content) if !content.is_empty() => Payload::Token(content),
                _ => Payload::Skip,
            }
        }
        Err(e) => {
            debug!("Skipping malformed chunk: {} ({})", data, e);
            Payload::Skip
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream_chat(&self, request: &CompletionRequest) -> Result<TokenStream, UpstreamError> {
        let url = self.completions_url();
        let body = self.build_request(request);

        info!("Streaming request to {} ({})", self.name, self.model);
        let resp = send_streaming(&self.name, self.http.post(&url).json(&body)).await?;

        Ok(token_stream(resp, parse_openai_payload))
    }
}
