//! Single-byte repeating XOR.

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};

/// XOR every byte with one key byte. Applying it twice restores the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XorCipher {
    key: u8,
}

impl XorCipher {
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    /// Key from the first byte of the shared secret; an empty secret gives
    /// the identity transform.
    pub fn from_secret(secret: &str) -> Self {
        Self::new(secret.as_bytes().first().copied().unwrap_or(0))
    }

    /// A cipher that leaves data unchanged.
    pub fn identity() -> Self {
        Self::new(0)
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn is_identity(&self) -> bool {
        self.key == 0
    }

    pub fn apply_in_place(&self, data: &mut [u8]) {
        if self.is_identity() {
            return;
        }
        for byte in data {
            *byte ^= self.key;
        }
    }

    pub fn apply(&self, data: Bytes) -> Bytes {
        if self.is_identity() {
            return data;
        }
        let mut owned = data.to_vec();
        self.apply_in_place(&mut owned);
        Bytes::from(owned)
    }

    /// Transform a body stream chunk by chunk.
    ///
    /// Because the key never advances, the output is identical to
    /// transforming the concatenated stream in one go.
    pub fn wrap_stream<S, E>(self, stream: S) -> impl Stream<Item = Result<Bytes, E>> + Send
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
    {
        stream.map(move |chunk| chunk.map(|bytes| self.apply(bytes)))
    }
}
