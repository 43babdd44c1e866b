use clap::Parser;
use std::num::NonZeroU32;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Server Args ---
    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:3000")]
    pub server_addr: String,

    /// Comma separated list of allowed CORS origins. Empty allows any origin.
    #[arg(long, env = "CORS_ORIGINS", default_value = "")]
    pub cors_origins: String,

    /// Derive the client IP from proxy headers (cf-connecting-ip, x-forwarded-for, x-real-ip).
    #[arg(long, env = "TRUST_PROXY_HEADERS", default_value = "true", action = clap::ArgAction::Set)]
    pub trust_proxy_headers: bool,

    // --- Primary Backend Args ---
    /// Base URL of the backend chat service (e.g., http://localhost:8000). Unset disables the primary path.
    #[arg(long, env = "BACKEND_URL")]
    pub backend_url: Option<String>,

    // --- Direct Provider Args ---
    /// Direct model provider used as fallback (openai, groq)
    #[arg(long, env = "AI_PROVIDER", default_value = "groq")]
    pub ai_provider: String,

    /// API Key for OpenAI, used when AI_PROVIDER=openai
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// API Key for Groq, used when AI_PROVIDER=groq
    #[arg(long, env = "GROQ_API_KEY")]
    pub groq_api_key: Option<String>,

    /// Model name override (defaults depend on the provider)
    #[arg(long, env = "AI_MODEL")]
    pub ai_model: Option<String>,

    /// Base URL override for the provider API
    #[arg(long, env = "AI_BASE_URL")]
    pub ai_base_url: Option<String>,

    /// Maximum tokens generated per response.
    #[arg(long, env = "AI_MAX_TOKENS", default_value = "500")]
    pub ai_max_tokens: u32,

    /// Sampling temperature for the provider.
    #[arg(long, env = "AI_TEMPERATURE", default_value = "0.7")]
    pub ai_temperature: f32,

    // --- Upstream Timeouts ---
    /// Seconds allowed to establish an upstream connection before it counts as unreachable.
    #[arg(long, env = "UPSTREAM_CONNECT_TIMEOUT_SECS", default_value = "10")]
    pub upstream_connect_timeout_secs: u64,

    /// Seconds without an upstream chunk before the stream is aborted.
    #[arg(long, env = "UPSTREAM_IDLE_TIMEOUT_SECS", default_value = "30")]
    pub upstream_idle_timeout_secs: u64,

    // --- Rate Limit Args ---
    #[arg(long, env = "RATE_LIMIT_PER_MINUTE", default_value = "10")]
    pub rate_limit_per_minute: NonZeroU32,

    #[arg(long, env = "RATE_LIMIT_PER_HOUR", default_value = "50")]
    pub rate_limit_per_hour: NonZeroU32,

    /// Soft daily limit. Requests over it are still served, with a warning logged.
    #[arg(long, env = "RATE_LIMIT_PER_DAY", default_value = "200")]
    pub rate_limit_per_day: NonZeroU32,

    // --- Validation Args ---
    /// Maximum characters allowed in a single user message.
    #[arg(long, env = "MAX_MESSAGE_LENGTH", default_value = "300")]
    pub max_message_length: usize,

    /// Maximum number of turns (context plus the new message) per request.
    #[arg(long, env = "MAX_CONVERSATION_HISTORY", default_value = "6")]
    pub max_conversation_history: usize,

    // --- Portfolio Args ---
    /// Path to the portfolio context JSON. The embedded copy is used when unset.
    #[arg(long, env = "PORTFOLIO_PATH")]
    pub portfolio_path: Option<String>,

    // --- Error Reporting Args ---
    /// Report unhandled failures through the telemetry reporter.
    #[arg(long, env = "ERROR_REPORTING", default_value = "false")]
    pub error_reporting: bool,

    /// Fraction of failures reported (0.0 to 1.0).
    #[arg(long, env = "ERROR_SAMPLE_RATE", default_value = "1.0")]
    pub error_sample_rate: f64,

    /// Deployment environment tag attached to reported failures.
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    // --- TLS Args ---
    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}
