//! Relay mode handler.
//!
//! Plain pass-through to one of several equivalent hosts. No frame, no
//! password, no obfuscation. Failures get a short plain-text 502.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

use crate::config::RelayModeConfig;
use crate::http::request::request_id;
use crate::load_balancer::HostPool;
use crate::observability::metrics;
use crate::upstream::Forwarder;

/// Static relay-mode state.
#[derive(Debug)]
pub struct RelayContext {
    pub target: Url,
    pub pool: HostPool,
    pub forwarder: Forwarder,
    pub max_body_bytes: usize,
}

pub type RelayState = Arc<RelayContext>;

impl RelayContext {
    pub fn new(
        config: &RelayModeConfig,
        forwarder: Forwarder,
        max_body_bytes: usize,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            target: Url::parse(&config.target_url)?,
            pool: HostPool::new(&config.hosts),
            forwarder,
            max_body_bytes,
        })
    }
}

pub async fn relay_handler(
    State(state): State<RelayState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();

    tracing::info!(
        peer = %peer,
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
        "Inbound request"
    );

    match pass_through(&state, request).await {
        Ok(response) => {
            metrics::record_request("relay", "forwarded", response.status().as_u16(), start);
            response
        }
        Err(cause) => {
            tracing::warn!(request_id = %request_id, peer = %peer, error = %cause, "Relay failed");
            metrics::record_request("relay", "upstream_error", StatusCode::BAD_GATEWAY.as_u16(), start);
            bad_gateway(&cause)
        }
    }
}

async fn pass_through(state: &RelayContext, request: Request<Body>) -> Result<Response, String> {
    let host = state
        .pool
        .pick()
        .ok_or_else(|| "no relay host configured".to_string())?;

    let mut url = host
        .rewrite(&state.target)
        .map_err(|e| format!("cannot relay to {host}: {e}"))?;
    url.set_query(request.uri().query());

    let (parts, body) = request.into_parts();
    let headers = relay_headers(&parts.headers, &host.to_string());
    let body = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| format!("failed to read request body: {e}"))?;
    let body = if body.is_empty() { None } else { Some(body) };

    tracing::debug!(host = %host, url = %url, method = %parts.method, "Relaying request");

    let deadline = state.forwarder.deadline(None);
    let upstream = state
        .forwarder
        .execute(parts.method, url, headers, body, deadline)
        .await
        .map_err(|e| e.to_string())?;

    let mut response = Response::builder().status(upstream.status());
    if let Some(out) = response.headers_mut() {
        for (name, value) in upstream.headers() {
            if name != header::TRANSFER_ENCODING {
                out.append(name.clone(), value.clone());
            }
        }
    }

    response
        .body(Body::from_stream(upstream.into_body_stream()))
        .map_err(|e| e.to_string())
}

/// Incoming headers as sent upstream: `Host` names the chosen relay host,
/// `Connection` is forced to `close` when present, framing headers are
/// recomputed by the client.
fn relay_headers(incoming: &HeaderMap, host: &str) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 1);
    for (name, value) in incoming {
        if name == header::HOST || name == header::TRANSFER_ENCODING || name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    if headers.contains_key(header::CONNECTION) {
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    if let Ok(host) = HeaderValue::from_str(host) {
        headers.insert(header::HOST, host);
    }
    headers
}

fn bad_gateway(cause: &str) -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        format!("502 Bad Gateway\n{cause}\n"),
    )
        .into_response()
}
