//! Content hashes and the oversized-file sentinel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Files at or above this length are not hashed.
pub const DEFAULT_HASH_SIZE_LIMIT: u64 = 2_000_000_000;

/// Stored in place of a digest for files that were too large to hash.
pub const TOO_LARGE_SENTINEL: &str = "NONE";

/// BLAKE3 content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the hash as an uppercase hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }

    /// Parse a 64-character hex string (either case).
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 || !hex.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

/// What a file record holds in its hash column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileHash {
    /// A computed digest.
    Digest(ContentHash),
    /// The file met the size limit and was not read.
    TooLarge,
}

impl FileHash {
    /// Whether a file of `length` bytes gets the sentinel under `limit`.
    pub fn exceeds_limit(length: u64, limit: u64) -> bool {
        length >= limit
    }

    /// Encode for storage.
    pub fn to_stored(&self) -> String {
        match self {
            Self::Digest(hash) => hash.to_hex(),
            Self::TooLarge => TOO_LARGE_SENTINEL.to_string(),
        }
    }

    /// Decode a stored value.
    pub fn from_stored(value: &str) -> Result<Self, IndexError> {
        if value == TOO_LARGE_SENTINEL {
            return Ok(Self::TooLarge);
        }
        ContentHash::from_hex(value)
            .map(Self::Digest)
            .ok_or_else(|| IndexError::InvalidHash {
                value: value.to_string(),
            })
    }

    /// The digest, if one was computed.
    pub fn digest(&self) -> Option<&ContentHash> {
        match self {
            Self::Digest(hash) => Some(hash),
            Self::TooLarge => None,
        }
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_stored())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_hex() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(hash.to_hex().len(), 64);
        assert!(hash.to_hex().starts_with("ABAB"));
        assert_eq!(ContentHash::from_hex(&hash.to_hex()), Some(hash));
        assert_eq!(ContentHash::from_hex(&"ab".repeat(32)), Some(hash));
    }

    #[test]
    fn test_from_hex_rejects_garbage() {
        assert!(ContentHash::from_hex("").is_none());
        assert!(ContentHash::from_hex(&"zz".repeat(32)).is_none());
        assert!(ContentHash::from_hex(&"ab".repeat(31)).is_none());
    }

    #[test]
    fn test_sentinel_decoding() {
        assert_eq!(FileHash::from_stored("NONE").unwrap(), FileHash::TooLarge);
        assert_eq!(FileHash::TooLarge.to_stored(), "NONE");
        assert!(FileHash::from_stored("not-a-hash").is_err());
    }

    #[test]
    fn test_limit_boundary() {
        assert!(FileHash::exceeds_limit(2_000_000_000, DEFAULT_HASH_SIZE_LIMIT));
        assert!(!FileHash::exceeds_limit(1_999_999_999, DEFAULT_HASH_SIZE_LIMIT));
    }
}
