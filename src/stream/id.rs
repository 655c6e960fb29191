//! Stream identifiers
//!
//! A `StreamId` is derived from the target page URL and doubles as the
//! registry key and the path segment of the relay address. Derivation is a
//! pure hash, so the same URL maps to the same id across restarts.

use std::fmt;

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest (64 bits)
const ID_LEN: usize = 16;

/// Stable identifier for one target URL
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    /// Derive the id for a target URL
    ///
    /// Deterministic and free of I/O. The output is lowercase hex, safe to
    /// embed in a URL path verbatim.
    pub fn derive(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(ID_LEN);
        Self(hex)
    }

    /// The raw id string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The relay path name for this stream
    pub fn relay_name(&self) -> String {
        format!("stream_{}", self.0)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
