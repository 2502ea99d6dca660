use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when validating a [`Sha256Digest`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    /// The digest string is not exactly 64 characters long.
    #[error("invalid SHA-256 digest length: expected 64 hex chars, got {0}")]
    InvalidLength(usize),

    /// The digest string contains characters outside `[0-9a-fA-F]`.
    #[error("invalid SHA-256 digest: non-hex characters in '{0}'")]
    InvalidHex(String),
}

/// A validated SHA-256 digest (64 lowercase hex characters).
///
/// Every expected or computed content hash in the system travels as this
/// type, so an invalid hex string cannot propagate past deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Create a digest from a hex string, validating length and charset.
    /// Uppercase input is normalized to lowercase.
    pub fn new(s: impl Into<String>) -> Result<Self, DigestError> {
        let s = s.into();
        if s.len() != 64 {
            return Err(DigestError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidHex(s));
        }
        Ok(Self(s.to_lowercase()))
    }

    /// Hex-encode a raw 32-byte digest produced by a hasher.
    pub fn from_bytes(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// The digest as a lowercase hex string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Sha256Digest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_digest() {
        let hex = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        let digest = Sha256Digest::new(hex).unwrap();
        assert_eq!(digest.as_str(), hex);
    }

    #[test]
    fn normalizes_uppercase() {
        let digest =
            Sha256Digest::new("B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9")
                .unwrap();
        assert!(digest.as_str().chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            Sha256Digest::new("abc123"),
            Err(DigestError::InvalidLength(6))
        );
    }

    #[test]
    fn rejects_non_hex() {
        let s = "zz4d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert!(matches!(
            Sha256Digest::new(s),
            Err(DigestError::InvalidHex(_))
        ));
    }

    #[test]
    fn deserialization_validates() {
        let ok: Result<Sha256Digest, _> = serde_json::from_str(
            "\"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9\"",
        );
        assert!(ok.is_ok());

        let bad: Result<Sha256Digest, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
