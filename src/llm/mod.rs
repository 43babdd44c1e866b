pub mod chat;
pub mod sse;

use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Groq,
}

impl LlmType {
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "gpt-4o-mini",
            LlmType::Groq => "llama-3.1-8b-instant",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmType::OpenAI => "https://api.openai.com/v1",
            LlmType::Groq => "https://api.groq.com/openai/v1",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::OpenAI => write!(f, "openai"),
            LlmType::Groq => write!(f, "groq"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}

impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

/// Direct model provider settings. Only built when an API key is present.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl LlmConfig {
    pub fn new(llm_type: LlmType, api_key: String) -> Self {
        Self {
            llm_type,
            api_key,
            model: llm_type.default_model().to_string(),
            base_url: llm_type.default_base_url().to_string(),
            max_tokens: 500,
            temperature: 0.7,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmType>(), Ok(LlmType::OpenAI));
        assert_eq!(" groq ".parse::<LlmType>(), Ok(LlmType::Groq));
        assert!("anthropic".parse::<LlmType>().is_err());
    }

    #[test]
    fn presets_follow_provider() {
        let cfg = LlmConfig::new(LlmType::Groq, "k".into());
        assert_eq!(cfg.model, "llama-3.1-8b-instant");
        assert_eq!(cfg.base_url, "https://api.groq.com/openai/v1");
    }
}
