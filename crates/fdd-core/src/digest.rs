//! # Content Digests — SHA-256 Identity for Raw Documents
//!
//! Every registered PDF is identified by the SHA-256 of its raw bytes.
//! The digest is the deduplication key, the storage path component, and
//! the linearization key for concurrent registration.
//!
//! ## Invariant
//!
//! The hex rendering is always lowercase and exactly 64 characters.
//! `ContentHash::from_hex` rejects anything else, so a hash read back
//! from the store is bit-identical to the one computed at registration.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error parsing a hex-encoded content hash.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DigestError {
    /// The hex string was not exactly 64 characters.
    #[error("content hash must be 64 hex chars, got {0}")]
    BadLength(usize),

    /// The string contained a non-hex or uppercase character.
    #[error("content hash must be lowercase hex: invalid char {0:?}")]
    BadChar(char),
}

/// SHA-256 digest of a document's raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Compute the digest of a byte stream.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let hash = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash);
        Self(out)
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Render as lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Parse a lowercase 64-char hex string.
    pub fn from_hex(hex: &str) -> Result<Self, DigestError> {
        if hex.len() != 64 {
            return Err(DigestError::BadLength(hex.len()));
        }
        let mut out = [0u8; 32];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            for &c in chunk {
                let ch = c as char;
                if !matches!(ch, '0'..='9' | 'a'..='f') {
                    return Err(DigestError::BadChar(ch));
                }
            }
            // Both chars validated above.
            out[i] = u8::from_str_radix(std::str::from_utf8(chunk).unwrap_or("00"), 16)
                .unwrap_or_default();
        }
        Ok(Self(out))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Derive a stable filename slug from a display name.
///
/// Lowercases, maps every non-alphanumeric run to a single dash, and
/// trims leading/trailing dashes. Empty input (or input with no
/// alphanumeric content) yields `"unnamed"` so path construction never
/// produces an empty component.
pub fn filename_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "unnamed".to_string()
    } else {
        slug
    }
}
