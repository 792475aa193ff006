//! Header name canonicalization and the ordered header list.
//!
//! # Responsibilities
//! - Rewrite header names to Title-Case per hyphen segment
//! - Keep decoded headers in arrival order, deduplicated by name
//! - Split combined `Set-Cookie` values into one line per cookie
//!
//! # Design Decisions
//! - Canonicalization is an explicit tokenizer, not a regex
//! - Canonical form is unique per case-insensitive name, so stored keys
//!   compare with plain equality

/// Prefix of pseudo-headers that carry relay parameters instead of HTTP headers.
pub const PARAM_PREFIX: &str = "x-urlfetch-";

/// Rewrite a header name as `Title-Case-Per-Segment`.
///
/// Each `-` separated segment gets an uppercase first character and
/// lowercase remainder; empty segments are preserved.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, segment) in name.split('-').enumerate() {
        if i > 0 {
            out.push('-');
        }
        let mut chars = segment.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            for c in chars {
                out.extend(c.to_lowercase());
            }
        }
    }
    out
}

/// If `name` is an out-of-band parameter, return its lower-cased key.
pub fn param_key(name: &str) -> Option<String> {
    let prefix_len = PARAM_PREFIX.len();
    if name.len() >= prefix_len
        && name.is_char_boundary(prefix_len)
        && name[..prefix_len].eq_ignore_ascii_case(PARAM_PREFIX)
    {
        Some(name[prefix_len..].to_lowercase())
    } else {
        None
    }
}

/// Ordered header mapping with case-insensitive, deduplicated keys.
///
/// Inserting an existing name replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a header. The name is canonicalized.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = canonical_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = canonical_name(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let name = canonical_name(name);
        let index = self.entries.iter().position(|(k, _)| *k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for Headers {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

/// Split a combined `Set-Cookie` value into individual cookies.
///
/// A comma is a split point only when what follows (after optional spaces)
/// is a `name=` token, so `Expires=Wed, 21 Oct 2015 07:28:00 GMT` stays whole.
pub fn split_set_cookie(value: &str) -> Vec<&str> {
    let bytes = value.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if b != b',' || !starts_cookie(&bytes[i + 1..]) {
            continue;
        }
        parts.push(value[start..i].trim());
        start = i + 1;
    }
    parts.push(value[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn starts_cookie(rest: &[u8]) -> bool {
    let rest = match rest.iter().position(|&b| b != b' ') {
        Some(skip) => &rest[skip..],
        None => return false,
    };
    let name_len = rest
        .iter()
        .take_while(|&&b| b != b'=' && b != b' ' && b != b';' && b != b',')
        .count();
    name_len > 0 && rest.get(name_len) == Some(&b'=')
}
