pub mod prompt;

use crate::cli::Args;
use crate::llm::{ LlmConfig, LlmType };
use log::warn;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid BACKEND_URL '{url}': {source}")]
    InvalidBackendUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("BACKEND_URL must use http or https, got '{0}'")]
    UnsupportedScheme(String),
    #[error("ERROR_SAMPLE_RATE must be within 0.0..=1.0, got {0}")]
    InvalidSampleRate(f64),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("Both --tls-cert-path and --tls-key-path must be provided to enable TLS")]
    IncompleteTls,
}

/// Which upstreams exist. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub backend_url: Option<String>,
    pub provider: Option<LlmConfig>,
}

impl ProviderConfig {
    pub fn is_backend_configured(&self) -> bool {
        self.backend_url.is_some()
    }

    pub fn is_provider_configured(&self) -> bool {
        self.provider.as_ref().is_some_and(|p| !p.api_key.is_empty())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub per_minute: NonZeroU32,
    pub per_hour: NonZeroU32,
    pub per_day: NonZeroU32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: NonZeroU32::new(10).unwrap_or(NonZeroU32::MIN),
            per_hour: NonZeroU32::new(50).unwrap_or(NonZeroU32::MIN),
            per_day: NonZeroU32::new(200).unwrap_or(NonZeroU32::MIN),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ValidationLimits {
    pub max_message_length: usize,
    pub max_conversation_history: usize,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self { max_message_length: 300, max_conversation_history: 6 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutConfig {
    pub connect: Duration,
    pub idle: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { connect: Duration::from_secs(10), idle: Duration::from_secs(30) }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub sample_rate: f64,
    pub environment: String,
}

#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub server_addr: String,
    pub cors_origins: Vec<String>,
    pub trust_proxy_headers: bool,
    pub provider: ProviderConfig,
    pub rate_limits: RateLimitConfig,
    pub validation: ValidationLimits,
    pub timeouts: TimeoutConfig,
    pub telemetry: TelemetryConfig,
    pub portfolio_path: Option<String>,
    pub tls: Option<TlsConfig>,
}

impl GatewayConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if args.max_message_length == 0 {
            return Err(ConfigError::Zero("MAX_MESSAGE_LENGTH"));
        }
        if args.max_conversation_history == 0 {
            return Err(ConfigError::Zero("MAX_CONVERSATION_HISTORY"));
        }
        if args.upstream_connect_timeout_secs == 0 {
            return Err(ConfigError::Zero("UPSTREAM_CONNECT_TIMEOUT_SECS"));
        }
        if args.upstream_idle_timeout_secs == 0 {
            return Err(ConfigError::Zero("UPSTREAM_IDLE_TIMEOUT_SECS"));
        }
        if !(0.0..=1.0).contains(&args.error_sample_rate) {
            return Err(ConfigError::InvalidSampleRate(args.error_sample_rate));
        }

        let tls = if args.enable_tls {
            match (&args.tls_cert_path, &args.tls_key_path) {
                (Some(cert), Some(key)) =>
                    Some(TlsConfig { cert_path: cert.clone(), key_path: key.clone() }),
                _ => {
                    return Err(ConfigError::IncompleteTls);
                }
            }
        } else {
            None
        };

        Ok(Self {
            server_addr: args.server_addr.clone(),
            cors_origins: parse_origins(&args.cors_origins),
            trust_proxy_headers: args.trust_proxy_headers,
            provider: ProviderConfig {
                backend_url: parse_backend_url(args.backend_url.as_deref())?,
                provider: provider_from_args(args),
            },
            rate_limits: RateLimitConfig {
                per_minute: args.rate_limit_per_minute,
                per_hour: args.rate_limit_per_hour,
                per_day: args.rate_limit_per_day,
            },
            validation: ValidationLimits {
                max_message_length: args.max_message_length,
                max_conversation_history: args.max_conversation_history,
            },
            timeouts: TimeoutConfig {
                connect: Duration::from_secs(args.upstream_connect_timeout_secs),
                idle: Duration::from_secs(args.upstream_idle_timeout_secs),
            },
            telemetry: TelemetryConfig {
                enabled: args.error_reporting,
                sample_rate: args.error_sample_rate,
                environment: args.environment.clone(),
            },
            portfolio_path: args.portfolio_path.clone().filter(|p| !p.trim().is_empty()),
            tls,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_backend_url(raw: Option<&str>) -> Result<Option<String>, ConfigError> {
    let raw = match raw.map(str::trim) {
        Some(r) if !r.is_empty() => r,
        _ => {
            return Ok(None);
        }
    };
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidBackendUrl {
        url: raw.to_string(),
        source,
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
    }
    Ok(Some(raw.trim_end_matches('/').to_string()))
}

fn provider_from_args(args: &Args) -> Option<LlmConfig> {
    let llm_type = args.ai_provider.parse::<LlmType>().unwrap_or_else(|e| {
        warn!("{}, falling back to groq", e);
        LlmType::Groq
    });

    let api_key = match llm_type {
        LlmType::OpenAI => args.openai_api_key.as_deref(),
        LlmType::Groq => args.groq_api_key.as_deref(),
    };
    let api_key = api_key.map(str::trim).filter(|k| !k.is_empty())?;

    let mut config = LlmConfig::new(llm_type, api_key.to_string());
    if let Some(model) = args.ai_model.as_deref().filter(|m| !m.trim().is_empty()) {
        config.model = model.to_string();
    }
    if let Some(url) = args.ai_base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    config.max_tokens = args.ai_max_tokens;
    config.temperature = args.ai_temperature;
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["nexi-gateway"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn provider_requires_matching_key() {
        let cfg = GatewayConfig::from_args(
            &args(&["--ai-provider", "openai", "--groq-api-key", "gsk"])
        ).unwrap();
        assert!(!cfg.provider.is_provider_configured());

        let cfg = GatewayConfig::from_args(
            &args(&["--ai-provider", "openai", "--openai-api-key", "sk-1"])
        ).unwrap();
        let provider = cfg.provider.provider.unwrap();
        assert_eq!(provider.llm_type, LlmType::OpenAI);
        assert_eq!(provider.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_provider_falls_back_to_groq() {
        let cfg = GatewayConfig::from_args(
            &args(&["--ai-provider", "mystery", "--groq-api-key", "gsk"])
        ).unwrap();
        assert_eq!(cfg.provider.provider.unwrap().llm_type, LlmType::Groq);
    }

    #[test]
    fn backend_url_is_validated_and_normalised() {
        let cfg = GatewayConfig::from_args(&args(&["--backend-url", "http://localhost:8000/"])).unwrap();
        assert_eq!(cfg.provider.backend_url.as_deref(), Some("http://localhost:8000"));

        assert!(GatewayConfig::from_args(&args(&["--backend-url", "not a url"])).is_err());
        assert!(
            matches!(
                GatewayConfig::from_args(&args(&["--backend-url", "ftp://host"])),
                Err(ConfigError::UnsupportedScheme(_))
            )
        );
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(GatewayConfig::from_args(&args(&["--error-sample-rate", "1.5"])).is_err());
        assert!(GatewayConfig::from_args(&args(&["--upstream-idle-timeout-secs", "0"])).is_err());
        assert!(GatewayConfig::from_args(&args(&["--enable-tls"])).is_err());
    }

    #[test]
    fn cors_origins_split_on_commas() {
        let cfg = GatewayConfig::from_args(
            &args(&["--cors-origins", "http://a.dev, http://b.dev,,"])
        ).unwrap();
        assert_eq!(cfg.cors_origins, vec!["http://a.dev", "http://b.dev"]);
    }
}
