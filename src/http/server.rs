//! HTTP server setup and connection serving.
//!
//! # Responsibilities
//! - Build the Axum Router for the configured mode
//! - Wire up middleware (request ID, tracing)
//! - Serve HTTP/1.1 and HTTP/2 on every accepted connection
//! - Stop accepting on shutdown and drain open connections

use axum::{extract::ConnectInfo, http::Request, routing::any, Router};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto,
    service::TowerToHyperService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tower_http::{request_id::SetRequestIdLayer, trace::TraceLayer};

use crate::config::{Mode, RelayConfig};
use crate::http::fetch::{fetch_handler, FetchContext};
use crate::http::relay::{relay_handler, RelayContext};
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::net::{ConnectionTracker, Listener};
use crate::upstream::{ForwardError, Forwarder};

/// Failure to assemble the server from configuration.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] ForwardError),

    #[error("invalid relay target URL: {0}")]
    RelayTarget(#[from] url::ParseError),
}

/// HTTP server for either operating mode.
pub struct HttpServer {
    router: Router,
    config: Arc<RelayConfig>,
}

impl HttpServer {
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let forwarder = Forwarder::new(&config.upstream)?;

        let routes = match config.mode {
            Mode::Fetch => {
                let state = Arc::new(FetchContext::new(config.fetch.clone(), forwarder));
                Router::new()
                    .route("/", any(fetch_handler))
                    .route("/{*path}", any(fetch_handler))
                    .with_state(state)
            }
            Mode::Relay => {
                let state = Arc::new(RelayContext::new(
                    &config.relay,
                    forwarder,
                    config.fetch.max_frame_bytes,
                )?);
                Router::new()
                    .route("/", any(relay_handler))
                    .route("/{*path}", any(relay_handler))
                    .with_state(state)
            }
        };

        let router = routes
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid));

        Ok(Self {
            router,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Accept connections until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, mode = %self.config.mode, "HTTP server starting");

        let tracker = ConnectionTracker::new();
        let builder = auto::Builder::new(TokioExecutor::new());

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let guard = tracker.track();
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Serving connection");

                    let service = self
                        .router
                        .clone()
                        .map_request(move |mut request: Request<Incoming>| {
                            request.extensions_mut().insert(ConnectInfo(peer));
                            request
                        });
                    let service = TowerToHyperService::new(service);
                    let builder = builder.clone();
                    let mut stop = shutdown.resubscribe();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let _guard = guard;

                        let conn = builder.serve_connection(TokioIo::new(stream), service);
                        tokio::pin!(conn);

                        let result = tokio::select! {
                            result = conn.as_mut() => result,
                            _ = stop.recv() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = result {
                            tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                        }
                    });
                }
            }
        }

        let grace = Duration::from_secs(self.config.listener.shutdown_grace_secs);
        let remaining = tracker.drain(grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Grace period over, dropping open connections");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
