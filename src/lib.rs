pub mod analytics;
pub mod cli;
pub mod client_ip;
pub mod config;
pub mod feedback;
pub mod llm;
pub mod models;
pub mod portfolio;
pub mod proxy;
pub mod rate_limit;
pub mod server;
pub mod telemetry;
pub mod validation;

use analytics::AnalyticsStore;
use cli::Args;
use config::GatewayConfig;
use feedback::FeedbackStore;
use llm::chat::new_clients;
use log::{ info, warn };
use portfolio::{ context_summary, load_portfolio_context };
use proxy::ChatProxy;
use rate_limit::ChatRateLimiter;
use server::{ AppState, Server };
use std::error::Error;
use std::sync::Arc;
use telemetry::{ ErrorReporter, Telemetry };

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = Arc::new(GatewayConfig::from_args(&args)?);

    info!("--- Core Configuration ---");
    info!("Server Address: {}", config.server_addr);
    info!("Backend URL: {}", config.provider.backend_url.as_deref().unwrap_or("(not configured)"));
    match &config.provider.provider {
        Some(p) if config.provider.is_provider_configured() => {
            info!("Fallback Provider: {} ({}, {})", p.llm_type, p.model, p.base_url);
        }
        _ => info!("Fallback Provider: (not configured)"),
    }
    info!(
        "Rate Limits: {}/min, {}/hour, {}/day (soft)",
        config.rate_limits.per_minute,
        config.rate_limits.per_hour,
        config.rate_limits.per_day
    );
    info!(
        "Validation: max {} chars, {} turns",
        config.validation.max_message_length,
        config.validation.max_conversation_history
    );
    info!("Upstream Timeouts: connect {:?}, idle {:?}", config.timeouts.connect, config.timeouts.idle);
    info!("Trust Proxy Headers: {}", config.trust_proxy_headers);
    info!("Error Reporting: {} (sample rate {})", config.telemetry.enabled, config.telemetry.sample_rate);
    info!("TLS Enabled: {}", config.tls.is_some());
    info!("-------------------------");

    let portfolio = load_portfolio_context(config.portfolio_path.as_deref())?;
    info!("{}", context_summary(&portfolio));

    let upstreams = new_clients(&config.provider, config.timeouts.connect)?;
    if upstreams.primary.is_none() && upstreams.fallback.is_none() {
        warn!("No backend or provider configured; chat requests will return an error chunk");
    }

    let reporter: Arc<dyn ErrorReporter> = Arc::new(Telemetry::new(&config.telemetry));
    let proxy = Arc::new(ChatProxy::new(upstreams, Arc::new(portfolio), config.timeouts, Arc::clone(&reporter)));

    let state = AppState {
        config: Arc::clone(&config),
        proxy,
        limiter: Arc::new(ChatRateLimiter::new(config.rate_limits)),
        feedback: Arc::new(FeedbackStore::default()),
        analytics: Arc::new(AnalyticsStore::default()),
        reporter,
    };

    info!("Starting server on: {}", config.server_addr);
    let server = Server::new(config.server_addr.clone(), state);
    server.run().await?;

    Ok(())
}
