//! Response head serialization for the return path.
//!
//! The client receives `HTTP/1.1 <code> <reason>\r\n(Name: value\r\n)*\r\n`
//! followed by the body, all of it passed through the obfuscation layer.

use axum::http::{header, HeaderMap, StatusCode};

use crate::codec::headers::{canonical_name, split_set_cookie};

/// Status line and headers of a response, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    headers: Vec<(String, Vec<u8>)>,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    /// Build from an origin response.
    ///
    /// Names are canonicalized, `Transfer-Encoding` is dropped and every
    /// cookie in `Set-Cookie` gets its own line.
    pub fn from_upstream(status: StatusCode, headers: &HeaderMap) -> Self {
        let mut head = Self::new(status);
        for (name, value) in headers {
            if name == header::TRANSFER_ENCODING {
                continue;
            }
            if name == header::SET_COOKIE {
                match value.to_str() {
                    Ok(combined) => {
                        for cookie in split_set_cookie(combined) {
                            head.push(name.as_str(), cookie.as_bytes());
                        }
                    }
                    Err(_) => head.push(name.as_str(), value.as_bytes()),
                }
                continue;
            }
            head.push(name.as_str(), value.as_bytes());
        }
        head
    }

    /// Append a header line. `Transfer-Encoding` is silently refused.
    pub fn push(&mut self, name: &str, value: &[u8]) {
        let name = canonical_name(name);
        if name == "Transfer-Encoding" {
            return;
        }
        self.headers.push((name, value.to_vec()));
    }

    /// First value of a header, if it is valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = canonical_name(name);
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .and_then(|(_, v)| std::str::from_utf8(v).ok())
    }

    pub fn headers(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Serialize status line, headers and the blank separator line.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.headers.len() * 32);
        out.extend_from_slice(b"HTTP/1.1 ");
        out.extend_from_slice(self.status.as_str().as_bytes());
        if let Some(reason) = self.status.canonical_reason() {
            out.push(b' ');
            out.extend_from_slice(reason.as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"\r\n");
        out
    }
}
