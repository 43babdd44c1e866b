pub mod api;

pub use api::{ build_router, AppState };

use crate::rate_limit::ChatRateLimiter;
use log::{ debug, error, info };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const PURGE_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct Server {
    addr: String,
    state: AppState,
}

impl Server {
    pub fn new(addr: String, state: AppState) -> Self {
        Self { addr, state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let addr = self.addr.parse::<SocketAddr>()?;
        spawn_purge_task(Arc::clone(&self.state.limiter));

        let app = build_router(self.state.clone());
        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        match &self.state.config.tls {
            Some(tls) => {
                let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
                    &tls.cert_path,
                    &tls.key_path
                ).await?;
                info!("HTTPS server listening on: https://{}", addr);
                axum_server::bind_rustls(addr, tls_config).serve(service).await?;
            }
            None => {
                let listener = match tokio::net::TcpListener::bind(addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
                        return Err(e.into());
                    }
                };
                info!("HTTP server listening on: http://{}", addr);
                axum::serve(listener, service).await?;
            }
        }

        Ok(())
    }
}

fn spawn_purge_task(limiter: Arc<ChatRateLimiter>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.purge_stale();
            debug!("Rate limiter purge done, {} clients tracked", limiter.tracked_clients());
        }
    });
}
