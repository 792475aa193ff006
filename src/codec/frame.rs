//! Request frame decoding (and the matching client-side encoder).
//!
//! Wire layout:
//! ```text
//! [u16 big-endian L][L bytes raw-deflate header block][body ...]
//!
//! header block (after inflate):
//!   METHOD SP URL SP PROTO CRLF
//!   (Name: value CRLF)*
//! ```
//! Names with the `X-URLFETCH-` prefix are relay parameters, not headers.

use axum::body::Bytes;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};
use thiserror::Error;
use url::Url;

use crate::codec::headers::{canonical_name, param_key, Headers, PARAM_PREFIX};

/// Protocol token written by the encoder. The decoder ignores it.
pub const FRAME_PROTOCOL: &str = "HTTP/1.1";

/// Errors produced while decoding a request frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frame truncated: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    #[error("header block inflate failed: {0}")]
    HeaderInflate(#[source] std::io::Error),

    #[error("header block is not valid UTF-8")]
    HeaderEncoding,

    #[error("malformed request line: {0:?}")]
    RequestLine(String),

    #[error("invalid target URL {url:?}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("deflate body inflate failed: {0}")]
    BodyInflate(#[source] std::io::Error),

    /// An inflated section grew past the decode limit.
    #[error("inflated {part} exceeds the {limit} byte limit")]
    TooLarge { part: &'static str, limit: usize },
}

/// Errors produced while encoding a request frame.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("compressed header block is {0} bytes, limit is 65535")]
    HeaderBlockTooLarge(usize),

    #[error("deflate failed: {0}")]
    Deflate(#[from] std::io::Error),
}

/// A request recovered from a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRequest {
    pub method: String,
    pub url: Url,
    /// Ordinary HTTP headers; never contains `X-URLFETCH-*` names.
    pub headers: Headers,
    /// Relay parameters keyed by lower-cased name.
    pub params: HashMap<String, String>,
    pub body: Bytes,
}

impl DecodedRequest {
    /// A bodyless request with no headers or parameters.
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            headers: Headers::new(),
            params: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Upper bound for the inflated header block.
pub const MAX_HEADER_BLOCK_BYTES: usize = 1024 * 1024;

/// Decode a complete frame.
///
/// `limit` caps the inflated size of the body; the header block is capped
/// at the smaller of `limit` and [`MAX_HEADER_BLOCK_BYTES`].
pub fn decode_request(frame: &[u8], limit: usize) -> Result<DecodedRequest, DecodeError> {
    if frame.len() < 2 {
        return Err(DecodeError::Truncated {
            needed: 2,
            available: frame.len(),
        });
    }
    let block_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let block_end = 2 + block_len;
    if frame.len() < block_end {
        return Err(DecodeError::Truncated {
            needed: block_end,
            available: frame.len(),
        });
    }

    let block_limit = limit.min(MAX_HEADER_BLOCK_BYTES);
    let block = inflate(&frame[2..block_end], block_limit)
        .map_err(DecodeError::HeaderInflate)?
        .ok_or(DecodeError::TooLarge {
            part: "header block",
            limit: block_limit,
        })?;
    let block = String::from_utf8(block).map_err(|_| DecodeError::HeaderEncoding)?;

    let mut lines = block.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut tokens = request_line.split_whitespace();
    let (method, target) = match (tokens.next(), tokens.next()) {
        (Some(method), Some(target)) => (method, target),
        _ => return Err(DecodeError::RequestLine(request_line.to_string())),
    };
    let url = Url::parse(target).map_err(|source| DecodeError::Url {
        url: target.to_string(),
        source,
    })?;

    let mut headers = Headers::new();
    let mut params = HashMap::new();
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        match param_key(name) {
            Some(key) => {
                params.insert(key, value.to_string());
            }
            None => headers.insert(name, value),
        }
    }

    let mut body = Bytes::copy_from_slice(&frame[block_end..]);
    if headers.get("Content-Encoding") == Some("deflate") {
        let inflated = inflate(&body, limit)
            .map_err(DecodeError::BodyInflate)?
            .ok_or(DecodeError::TooLarge { part: "body", limit })?;
        body = Bytes::from(inflated);
        headers.insert("Content-Length", body.len().to_string());
        headers.remove("Content-Encoding");
    }

    Ok(DecodedRequest {
        method: method.to_string(),
        url,
        headers,
        params,
        body,
    })
}

/// Encode a request the way a client does.
///
/// The body is written as-is; callers that declare
/// `Content-Encoding: deflate` must pass a body from [`compress_body`].
pub fn encode_request(request: &DecodedRequest) -> Result<Vec<u8>, EncodeError> {
    let mut block = format!("{} {} {}\r\n", request.method, request.url, FRAME_PROTOCOL);
    for (name, value) in request.headers.iter() {
        block.push_str(&format!("{}: {}\r\n", name, value));
    }
    let mut params: Vec<_> = request.params.iter().collect();
    params.sort();
    for (key, value) in params {
        block.push_str(&format!(
            "{}{}: {}\r\n",
            canonical_name(PARAM_PREFIX),
            key,
            value
        ));
    }

    let compressed = compress_body(block.as_bytes())?;
    let block_len = u16::try_from(compressed.len())
        .map_err(|_| EncodeError::HeaderBlockTooLarge(compressed.len()))?;

    let mut frame = Vec::with_capacity(2 + compressed.len() + request.body.len());
    frame.extend_from_slice(&block_len.to_be_bytes());
    frame.extend_from_slice(&compressed);
    frame.extend_from_slice(&request.body);
    Ok(frame)
}

/// Raw-deflate (no zlib header or trailer) compress `data`.
pub fn compress_body(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Inflate at most `limit` bytes. `Ok(None)` means the stream holds more.
fn inflate(data: &[u8], limit: usize) -> Result<Option<Vec<u8>>, std::io::Error> {
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).min(limit));
    DeflateDecoder::new(data).take(cap).read_to_end(&mut out)?;
    if out.len() > limit {
        return Ok(None);
    }
    Ok(Some(out))
}
