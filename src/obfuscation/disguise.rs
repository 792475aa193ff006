//! Outbound Content-Type selection.

use crate::config::FetchConfig;
use crate::obfuscation::xor::XorCipher;

/// Origin content types that switch the response to the media disguise.
const MEDIA_PREFIXES: &[&str] = &["audio/", "image/", "video/", "application/octet-stream"];

/// Chosen outer Content-Type plus the cipher to use with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wrapping<'a> {
    pub content_type: &'a str,
    pub cipher: XorCipher,
}

/// Decides how a response is dressed up on its way back to the client.
///
/// The decision is made once, from the origin headers, before any response
/// byte is written.
#[derive(Debug, Clone)]
pub struct Disguise {
    default_type: String,
    media_type: String,
    cipher: XorCipher,
    obfuscate_media: bool,
}

impl Disguise {
    pub fn new(
        default_type: impl Into<String>,
        media_type: impl Into<String>,
        cipher: XorCipher,
        obfuscate_media: bool,
    ) -> Self {
        Self {
            default_type: default_type.into(),
            media_type: media_type.into(),
            cipher,
            obfuscate_media,
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            config.content_type.clone(),
            config.media_content_type.clone(),
            XorCipher::from_secret(&config.password),
            config.obfuscate_media,
        )
    }

    /// Wrapping for synthetic responses (error pages): always the default
    /// type, always obfuscated.
    pub fn default_wrapping(&self) -> Wrapping<'_> {
        Wrapping {
            content_type: &self.default_type,
            cipher: self.cipher,
        }
    }

    /// Wrapping for an origin response with the given Content-Type.
    pub fn select(&self, origin_content_type: Option<&str>) -> Wrapping<'_> {
        if !origin_content_type.is_some_and(is_media) {
            return self.default_wrapping();
        }
        Wrapping {
            content_type: &self.media_type,
            cipher: if self.obfuscate_media {
                self.cipher
            } else {
                XorCipher::identity()
            },
        }
    }
}

fn is_media(content_type: &str) -> bool {
    let content_type = content_type.trim_start().to_ascii_lowercase();
    MEDIA_PREFIXES.iter().any(|p| content_type.starts_with(p))
}
