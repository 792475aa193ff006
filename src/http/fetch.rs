//! Frame relay handler.
//!
//! # Responsibilities
//! - Turn away anything that is not a framed POST (redirect)
//! - Decode, authorize and forward one framed request
//! - Pick the disguise from the origin head, then stream the obfuscated
//!   head and body back
//! - Answer every failure with an obfuscated error page

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{stream, StreamExt, TryStreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::codec::{decode_request, DecodeError, ResponseHead, FRAME_PROTOCOL};
use crate::config::FetchConfig;
use crate::http::request::request_id;
use crate::http::response::{error_frame, FORBIDDEN_TITLE, URLFETCH_ERROR_TITLE};
use crate::obfuscation::Disguise;
use crate::observability::metrics;
use crate::security::{PolicyGate, Rejection};
use crate::upstream::{ForwardError, Forwarder};

/// Everything a fetch request needs, built once at startup.
#[derive(Debug)]
pub struct FetchContext {
    pub config: FetchConfig,
    pub policy: PolicyGate,
    pub disguise: Disguise,
    pub forwarder: Forwarder,
}

pub type FetchState = Arc<FetchContext>;

impl FetchContext {
    pub fn new(config: FetchConfig, forwarder: Forwarder) -> Self {
        Self {
            policy: PolicyGate::from_config(&config),
            disguise: Disguise::from_config(&config),
            forwarder,
            config,
        }
    }
}

/// A request that ends in an error page instead of origin content.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("frame of {0} bytes exceeds the {1} byte limit")]
    FrameTooLarge(u64, usize),

    #[error("failed to read frame: {0}")]
    Read(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error("{url}: {source}")]
    Forward {
        url: String,
        #[source]
        source: ForwardError,
    },
}

impl FetchError {
    /// Status carried inside the obfuscated frame.
    pub fn status(&self) -> StatusCode {
        match self {
            FetchError::FrameTooLarge(..) | FetchError::Decode(DecodeError::TooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            FetchError::Read(_) | FetchError::Decode(_) => StatusCode::BAD_REQUEST,
            FetchError::Rejected(_) => StatusCode::FORBIDDEN,
            FetchError::Forward { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Metrics label.
    pub fn outcome(&self) -> &'static str {
        match self {
            FetchError::FrameTooLarge(..) | FetchError::Read(_) | FetchError::Decode(_) => "malformed",
            FetchError::Rejected(_) => "denied",
            FetchError::Forward { source, .. } if source.is_timeout() => "timeout",
            FetchError::Forward { .. } => "upstream_error",
        }
    }

    /// Serialized error page (head and HTML), before obfuscation.
    pub fn page(&self) -> Vec<u8> {
        let status = self.status();
        match self {
            FetchError::FrameTooLarge(size, limit) => error_frame(
                status,
                "413 Payload Too Large",
                "Frame Too Large",
                &format!("frame of {size} bytes exceeds the {limit} byte limit"),
            ),
            FetchError::Decode(e @ DecodeError::TooLarge { .. }) => error_frame(
                status,
                "413 Payload Too Large",
                "Frame Too Large",
                &e.to_string(),
            ),
            FetchError::Read(e) => error_frame(status, "400 Bad Request", "Malformed Frame", e),
            FetchError::Decode(e) => {
                error_frame(status, "400 Bad Request", "Malformed Frame", &e.to_string())
            }
            FetchError::Rejected(Rejection::WrongPassword) => {
                error_frame(status, FORBIDDEN_TITLE, "Wrong Password", "please edit proxy.ini")
            }
            FetchError::Rejected(Rejection::HostDenied { host, pattern }) => error_frame(
                status,
                FORBIDDEN_TITLE,
                &format!("hostsdeny matched({host})"),
                &format!("{host} matches denylist pattern {pattern}"),
            ),
            FetchError::Forward { url, source } => match source {
                ForwardError::InvalidMethod(method) => error_frame(
                    status,
                    URLFETCH_ERROR_TITLE,
                    "Invalid Method",
                    &format!("Method {method:?} is not a valid HTTP method"),
                ),
                ForwardError::Timeout(_) => {
                    error_frame(status, URLFETCH_ERROR_TITLE, "http.request timeout", "request timeout")
                }
                ForwardError::Transport(cause) => error_frame(
                    status,
                    URLFETCH_ERROR_TITLE,
                    &format!("http.request error: {cause}"),
                    url,
                ),
                other => error_frame(status, URLFETCH_ERROR_TITLE, "Urlfetch Error", &other.to_string()),
            },
        }
    }
}

/// Entry point for every request in fetch mode.
pub async fn fetch_handler(
    State(state): State<FetchState>,
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

    let frame_len = content_length(request.headers());
    if request.method() != Method::POST || frame_len.unwrap_or(0) == 0 {
        metrics::record_request("fetch", "redirect", StatusCode::FOUND.as_u16(), start);
        return redirect(&state.config.redirect_location);
    }

    match relay_frame(&state, peer, request, frame_len.unwrap_or(0)).await {
        Ok(response) => {
            metrics::record_request("fetch", "forwarded", StatusCode::OK.as_u16(), start);
            response
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                peer = %peer,
                status = e.status().as_u16(),
                error = %e,
                "Fetch failed"
            );
            metrics::record_request("fetch", e.outcome(), e.status().as_u16(), start);
            error_response(&state.disguise, &e)
        }
    }
}

async fn relay_frame(
    state: &FetchContext,
    peer: SocketAddr,
    request: Request<Body>,
    frame_len: u64,
) -> Result<Response, FetchError> {
    let limit = state.config.max_frame_bytes;
    if frame_len > limit as u64 {
        return Err(FetchError::FrameTooLarge(frame_len, limit));
    }

    let frame = axum::body::to_bytes(request.into_body(), limit)
        .await
        .map_err(|e| FetchError::Read(e.to_string()))?;
    let decoded = decode_request(&frame, limit)?;

    tracing::info!(
        peer = %peer,
        method = %decoded.method,
        url = %decoded.url,
        protocol = FRAME_PROTOCOL,
        "Decoded request"
    );

    state.policy.authorize(&decoded)?;

    let url = decoded.url.to_string();
    let upstream = state
        .forwarder
        .forward(decoded)
        .await
        .map_err(|source| FetchError::Forward { url: url.clone(), source })?;

    // Head first: the disguise must be settled before any byte goes out.
    let head = ResponseHead::from_upstream(upstream.status(), upstream.headers());
    let wrapping = state.disguise.select(upstream.content_type());
    let cipher = wrapping.cipher;
    let content_type = HeaderValue::from_str(wrapping.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("image/gif"));

    tracing::debug!(
        url = %url,
        status = head.status.as_u16(),
        disguise = %wrapping.content_type,
        "Upstream responded"
    );

    let head_chunk = cipher.apply(Bytes::from(head.to_bytes()));
    let body = cipher
        .wrap_stream(upstream.into_body_stream())
        .inspect_err(move |e| {
            tracing::warn!(url = %url, error = %e, "Upstream body aborted mid-stream");
        });
    let stream = stream::once(async move { Ok::<_, reqwest::Error>(head_chunk) }).chain(body);

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(stream),
    )
        .into_response())
}

fn error_response(disguise: &Disguise, error: &FetchError) -> Response {
    let wrapping = disguise.default_wrapping();
    let body = wrapping.cipher.apply(Bytes::from(error.page()));
    let content_type = HeaderValue::from_str(wrapping.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("image/gif"));

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        body,
    )
        .into_response()
}

fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
