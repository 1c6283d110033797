//! Content identifiers derived from descriptor metadata.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::error::TransferError;

/// 20-byte identifier of a transfer session (the `BitTorrent` info hash).
///
/// Ordering on the raw bytes matches ordering on the lowercase hex rendering, so sorting
/// by `ContentId` sorts by canonical text.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId([u8; ContentId::LEN]);

impl ContentId {
    /// Byte length of an identifier.
    pub const LEN: usize = 20;

    /// Wrap raw identifier bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the identifier of a raw bencoded `info` dictionary.
    #[must_use]
    pub fn digest(info: &[u8]) -> Self {
        let mut bytes = [0_u8; Self::LEN];
        bytes.copy_from_slice(&Sha1::digest(info));
        Self(bytes)
    }

    /// Raw identifier bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Parse 40 hexadecimal characters in either case.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidContentId`] when the input is not 40 hex digits.
    pub fn from_hex(value: &str) -> Result<Self, TransferError> {
        let invalid = || TransferError::InvalidContentId {
            value: value.to_string(),
        };
        let raw = value.as_bytes();
        if raw.len() != Self::LEN * 2 {
            return Err(invalid());
        }
        let mut bytes = [0_u8; Self::LEN];
        for (slot, pair) in bytes.iter_mut().zip(raw.chunks_exact(2)) {
            let high = hex_value(pair[0]).ok_or_else(invalid)?;
            let low = hex_value(pair[1]).ok_or_else(invalid)?;
            *slot = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({self})")
    }
}

impl FromStr for ContentId {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_lowercase_hex_and_parses_mixed_case() {
        let id = ContentId::from_bytes([0xAB; ContentId::LEN]);
        let text = id.to_string();
        assert_eq!(text, "ab".repeat(20));
        assert_eq!(ContentId::from_hex(&text.to_uppercase()).ok(), Some(id));
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(ContentId::from_hex("abc").is_err());
        assert!(ContentId::from_hex(&"zz".repeat(20)).is_err());
    }

    #[test]
    fn byte_order_matches_text_order() {
        let mut ids = vec![
            ContentId::from_bytes([0xf0; 20]),
            ContentId::from_bytes([0x0a; 20]),
            ContentId::from_bytes([0x9f; 20]),
        ];
        let mut texts: Vec<String> = ids.iter().map(ToString::to_string).collect();
        ids.sort();
        texts.sort();
        let rendered: Vec<String> = ids.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, texts);
    }

    #[test]
    fn digest_matches_known_sha1() {
        let id = ContentId::digest(b"abc");
        assert_eq!(id.to_string(), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn serializes_as_hex_string() -> Result<(), serde_json::Error> {
        let id = ContentId::from_bytes([0x01; 20]);
        let json = serde_json::to_string(&id)?;
        assert_eq!(json, format!("\"{}\"", "01".repeat(20)));
        let back: ContentId = serde_json::from_str(&json)?;
        assert_eq!(back, id);
        Ok(())
    }
}
