//! Origin requests.
//!
//! # Responsibilities
//! - Turn a decoded request into one HTTP/HTTPS call to the origin
//! - Enforce the per-request deadline on the header phase and the body
//! - Hand back status and headers first, body as a stream
//!
//! # Design Decisions
//! - One upstream attempt, no retry, no idle connection kept
//! - Redirects are relayed, never followed
//! - Bytes are relayed as the origin sent them (no transparent decompression)

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use futures_util::Stream;
use std::time::Duration;
use url::Url;

use crate::codec::{DecodedRequest, Headers};
use crate::config::UpstreamConfig;
use crate::resilience::timeouts::{connect_deadline, request_deadline, with_deadline};
use crate::upstream::error::ForwardError;

/// Status and headers of an origin response with its body still unread.
#[derive(Debug)]
pub struct UpstreamResponse {
    inner: reqwest::Response,
}

impl UpstreamResponse {
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.inner
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Body chunks as they arrive. A deadline hit mid-body ends the stream
    /// with an error.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Send {
        self.inner.bytes_stream()
    }
}

/// Shared, immutable origin client.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    config: UpstreamConfig,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, ForwardError> {
        let client = reqwest::Client::builder()
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .connect_timeout(connect_deadline(config))
            .build()
            .map_err(ForwardError::Client)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Deadline for a request carrying the given `timeout` parameter.
    pub fn deadline(&self, requested: Option<&str>) -> Duration {
        request_deadline(&self.config, requested)
    }

    /// Forward a decoded frame to its target URL.
    pub async fn forward(&self, request: DecodedRequest) -> Result<UpstreamResponse, ForwardError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ForwardError::InvalidMethod(request.method.clone()))?;
        let deadline = self.deadline(request.param("timeout"));

        let send_body = method != Method::HEAD && !request.body.is_empty();
        let mut headers = outbound_headers(&request.headers);
        headers.remove(header::TRANSFER_ENCODING);
        if send_body {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(request.body.len()));
        } else {
            headers.remove(header::CONTENT_LENGTH);
        }
        let body = if send_body { Some(request.body) } else { None };

        self.execute(method, request.url, headers, body, deadline).await
    }

    /// Send one request and wait for the origin's status and headers.
    pub async fn execute(
        &self,
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Option<Bytes>,
        deadline: Duration,
    ) -> Result<UpstreamResponse, ForwardError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ForwardError::UnsupportedScheme(url.scheme().to_string()));
        }

        let mut builder = self
            .client
            .request(method, url)
            .headers(headers)
            .timeout(deadline);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        match with_deadline(deadline, builder.send()).await {
            Ok(Ok(inner)) => Ok(UpstreamResponse { inner }),
            Ok(Err(e)) if e.is_timeout() => Err(ForwardError::Timeout(deadline)),
            Ok(Err(e)) => Err(ForwardError::transport(&e)),
            Err(elapsed) => Err(ForwardError::Timeout(elapsed.0)),
        }
    }
}

/// Convert decoded headers, forcing `Connection: close` when a
/// `Connection` header was sent. Names or values that are not valid
/// HTTP are dropped.
pub fn outbound_headers(headers: &Headers) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "Dropping invalid header");
            continue;
        };
        out.insert(name, value);
    }
    if out.contains_key(header::CONNECTION) {
        out.insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    out
}
