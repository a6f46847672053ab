//! Cache key derivation.
//!
//! A key identifies one synthesized artifact by the parameters that shaped it.
//! Fields are normalized before hashing so incidental whitespace and float
//! noise never split one logical request into two cache entries.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Parameters that determine a synthesized artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheKey {
    pub text: String,
    pub voice: String,
    pub speed: f64,
    pub response_format: String,
    pub instructions: Option<String>,
}

/// Canonical form fed to the digest. Field order is alphabetical so the
/// serialized JSON is identical to a sorted-key encoding.
#[derive(Serialize)]
struct CanonicalKey<'a> {
    instructions: Option<&'a str>,
    response_format: &'a str,
    speed: f64,
    text: &'a str,
    voice: &'a str,
}

impl CacheKey {
    pub fn new(
        text: impl Into<String>,
        voice: impl Into<String>,
        speed: f64,
        response_format: impl Into<String>,
        instructions: Option<String>,
    ) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            speed,
            response_format: response_format.into(),
            instructions,
        }
    }

    /// SHA-256 hex digest over the normalized fields.
    pub fn to_hash(&self) -> String {
        let canonical = CanonicalKey {
            instructions: self.instructions.as_deref().map(str::trim),
            response_format: &self.response_format,
            speed: round_speed(self.speed),
            text: self.text.trim(),
            voice: &self.voice,
        };
        // Serializing plain strings and an f64 cannot fail.
        let encoded = serde_json::to_string(&canonical).unwrap_or_default();
        hex::encode(Sha256::digest(encoded.as_bytes()))
    }
}

/// Round to two decimal places so 1.001 and 1.0 share a key.
fn round_speed(speed: f64) -> f64 {
    let rounded = (speed * 100.0).round() / 100.0;
    // Collapse -0.0 so it serializes like 0.0.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hash = self.to_hash();
        write!(f, "TtsCacheKey({}...)", &hash[..12])
    }
}

/// Convenience wrapper over [`CacheKey::to_hash`].
pub fn derive(
    text: &str,
    voice: &str,
    speed: f64,
    response_format: &str,
    instructions: Option<&str>,
) -> String {
    CacheKey::new(
        text,
        voice,
        speed,
        response_format,
        instructions.map(str::to_string),
    )
    .to_hash()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_and_rounding_normalize() {
        assert_eq!(
            derive(" hi ", "alloy", 1.001, "mp3", None),
            derive("hi", "alloy", 1.00, "mp3", None)
        );
    }

    #[test]
    fn test_instructions_are_trimmed() {
        assert_eq!(
            derive("hi", "alloy", 1.0, "mp3", Some("  calm  ")),
            derive("hi", "alloy", 1.0, "mp3", Some("calm"))
        );
    }

    #[test]
    fn test_sensitive_to_each_field() {
        let base = derive("hi", "alloy", 1.0, "mp3", None);
        assert_ne!(base, derive("hi", "echo", 1.0, "mp3", None));
        assert_ne!(base, derive("hi", "alloy", 1.0, "wav", None));
        assert_ne!(base, derive("hi", "alloy", 1.25, "mp3", None));
        assert_ne!(base, derive("hello", "alloy", 1.0, "mp3", None));
        assert_ne!(base, derive("hi", "alloy", 1.0, "mp3", Some("calm")));
    }

    #[test]
    fn test_absent_and_blank_instructions_differ() {
        assert_ne!(
            derive("hi", "alloy", 1.0, "mp3", None),
            derive("hi", "alloy", 1.0, "mp3", Some("   "))
        );
    }

    #[test]
    fn test_digest_is_hex_sha256() {
        let h = derive("hi", "alloy", 1.0, "mp3", None);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        // stable across calls
        assert_eq!(h, derive("hi", "alloy", 1.0, "mp3", None));
    }

    #[test]
    fn test_display_shows_prefix() {
        let key = CacheKey::new("hi", "alloy", 1.0, "mp3", None);
        let shown = key.to_string();
        assert!(shown.starts_with("TtsCacheKey("));
        assert!(shown.contains(&key.to_hash()[..12]));
    }
}
