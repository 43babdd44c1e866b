pub mod error;

pub use error::ProxyError;

use futures::StreamExt;
use log::{ debug, error, info, warn };
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::TimeoutConfig;
use crate::config::prompt::{ build_system_prompt, ERROR_MESSAGES };
use crate::llm::chat::{ ChatClient, CompletionRequest, TokenStream, UpstreamError, Upstreams };
use crate::models::{ ChatRequest, StreamChunk };
use crate::portfolio::PortfolioContext;
use crate::telemetry::ErrorReporter;

const CHUNK_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamPath {
    Primary,
    Fallback,
}

impl fmt::Display for UpstreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpstreamPath::Primary => write!(f, "primary"),
            UpstreamPath::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug)]
pub enum RelayOutcome {
    Completed {
        chunks: usize,
    },
    Failed(UpstreamError),
    ClientGone,
}

/// Chooses an upstream for each request and relays its tokens, in order,
/// into a bounded channel that backs the SSE response.
pub struct ChatProxy {
    primary: Option<Arc<dyn ChatClient>>,
    fallback: Option<Arc<dyn ChatClient>>,
    portfolio: Arc<PortfolioContext>,
    system_prompt: OnceCell<String>,
    timeouts: TimeoutConfig,
    reporter: Arc<dyn ErrorReporter>,
}

impl ChatProxy {
    pub fn new(
        upstreams: Upstreams,
        portfolio: Arc<PortfolioContext>,
        timeouts: TimeoutConfig,
        reporter: Arc<dyn ErrorReporter>
    ) -> Self {
        Self {
            primary: upstreams.primary,
            fallback: upstreams.fallback,
            portfolio,
            system_prompt: OnceCell::new(),
            timeouts,
            reporter,
        }
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn is_provider_configured(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn get_portfolio_context(&self) -> &PortfolioContext {
        &self.portfolio
    }

    fn system_prompt(&self) -> &str {
        self.system_prompt.get_or_init(|| build_system_prompt(&self.portfolio))
    }

    async fn connect(
        &self,
        client: &dyn ChatClient,
        request: &CompletionRequest
    ) -> Result<TokenStream, UpstreamError> {
        let limit = self.timeouts.connect;
        match tokio::time::timeout(limit, client.stream_chat(request)).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::ConnectTimeout(limit)),
        }
    }

    /// Primary first; the fallback is only tried when the primary is absent
    /// or could not be reached.
    pub async fn open(&self, request: &ChatRequest) -> Result<(UpstreamPath, TokenStream), ProxyError> {
        let messages = request.to_messages();

        if let Some(primary) = &self.primary {
            let upstream_req = CompletionRequest {
                messages: messages.clone(),
                system_prompt: None,
                session_id: request.session_id.clone(),
            };
            match self.connect(primary.as_ref(), &upstream_req).await {
                Ok(stream) => {
                    return Ok((UpstreamPath::Primary, stream));
                }
                Err(e) => {
                    warn!("Primary backend unreachable, trying fallback: {}", e);
                }
            }
        } else {
            debug!("Primary backend not configured");
        }

        let fallback = match &self.fallback {
            Some(fallback) => fallback,
            None => {
                return Err(ProxyError::UpstreamUnavailable);
            }
        };

        let upstream_req = CompletionRequest {
            messages,
            system_prompt: Some(self.system_prompt().to_string()),
            session_id: request.session_id.clone(),
        };
        match self.connect(fallback.as_ref(), &upstream_req).await {
            Ok(stream) => Ok((UpstreamPath::Fallback, stream)),
            Err(e) => {
                error!("Fallback provider {} unreachable: {}", fallback.name(), e);
                self.reporter.capture(&e, &[("stage", "fallback_connect")]);
                Err(ProxyError::UpstreamUnavailable)
            }
        }
    }

    /// Spawns the relay for one request. Dropping the returned stream stops
    /// the relay and releases the upstream connection.
    pub fn stream(self: &Arc<Self>, request: ChatRequest) -> ReceiverStream<StreamChunk> {
        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let supervisor_tx = tx.clone();
        let proxy = Arc::clone(self);

        let relay_task = tokio::spawn(async move {
            let opened = tokio::select! {
                _ = tx.closed() => {
                    debug!("Client left before an upstream was opened");
                    return;
                }
                opened = proxy.open(&request) => opened,
            };

            let (path, upstream) = match opened {
                Ok(opened) => opened,
                Err(e) => {
                    let _ = tx.send(StreamChunk::Error { error: e.client_message() }).await;
                    return;
                }
            };

            info!("Relaying chat stream from {} path", path);
            match relay(upstream, &tx, proxy.timeouts.idle).await {
                RelayOutcome::Completed { chunks } => {
                    info!("Chat stream completed via {} ({} chunks)", path, chunks);
                }
                RelayOutcome::ClientGone => {
                    info!("Client disconnected, upstream {} released", path);
                }
                RelayOutcome::Failed(e) => {
                    error!("Chat stream failed via {}: {}", path, e);
                    let err = ProxyError::UpstreamFailedMidStream(e);
                    let path_name = path.to_string();
                    proxy.reporter.capture(&err, &[("path", path_name.as_str())]);
                }
            }
        });

        let reporter = Arc::clone(&self.reporter);
        tokio::spawn(async move {
            if let Err(join_err) = relay_task.await {
                if join_err.is_panic() {
                    let err = ProxyError::InternalError("relay task panicked".to_string());
                    error!("{}", err);
                    reporter.capture(&err, &[]);
                    let _ = supervisor_tx.send(StreamChunk::Error {
                        error: err.client_message(),
                    }).await;
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

/// Forwards tokens until the upstream ends, fails, goes idle, or the client
/// disconnects. Exactly one terminal chunk is sent unless the client is gone.
pub async fn relay(
    mut upstream: TokenStream,
    tx: &mpsc::Sender<StreamChunk>,
    idle: Duration
) -> RelayOutcome {
    let mut chunks = 0usize;
    loop {
        let next = tokio::select! {
            biased;
            _ = tx.closed() => {
                return RelayOutcome::ClientGone;
            }
            next = tokio::time::timeout(idle, upstream.next()) => next,
        };

        match next {
            Ok(Some(Ok(content))) => {
                if tx.send(StreamChunk::Content { content }).await.is_err() {
                    return RelayOutcome::ClientGone;
                }
                chunks += 1;
            }
            Ok(None) => {
                if tx.send(StreamChunk::Done).await.is_err() {
                    return RelayOutcome::ClientGone;
                }
                return RelayOutcome::Completed { chunks };
            }
            Ok(Some(Err(e))) => {
                let _ = tx.send(StreamChunk::Error { error: ERROR_MESSAGES.generic_error.to_string() }).await;
                return RelayOutcome::Failed(e);
            }
            Err(_) => {
                let _ = tx.send(StreamChunk::Error { error: ERROR_MESSAGES.upstream_timeout.to_string() }).await;
                return RelayOutcome::Failed(UpstreamError::IdleTimeout(idle));
            }
        }
    }
}
