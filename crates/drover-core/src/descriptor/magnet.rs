//! Magnet URI parsing.

use std::str::FromStr;

use url::Url;

use crate::error::{TransferError, TransferResult};
use crate::model::ContentId;

const BTIH_PREFIX: &str = "urn:btih:";

/// Parsed magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    /// Identifier from the `xt=urn:btih:` parameter.
    pub info_hash: ContentId,
    /// Display name hint (`dn`).
    pub display_name: Option<String>,
    /// Tracker hints (`tr`), deduplicated in order.
    pub trackers: Vec<String>,
}

impl MagnetLink {
    /// Parse a `magnet:` URI.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidMagnet`] when the URI is not a magnet link or carries no
    /// usable `BitTorrent` info hash.
    pub fn parse(uri: &str) -> TransferResult<Self> {
        let url = Url::parse(uri.trim()).map_err(|_| TransferError::magnet(uri, "unparseable uri"))?;
        if url.scheme() != "magnet" {
            return Err(TransferError::magnet(uri, "scheme is not magnet"));
        }
        let mut info_hash = None;
        let mut display_name = None;
        let mut trackers: Vec<String> = Vec::new();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" if info_hash.is_none() => {
                    if let Some(encoded) = strip_prefix_ignore_case(&value, BTIH_PREFIX) {
                        info_hash = Some(
                            decode_btih(encoded)
                                .ok_or_else(|| TransferError::magnet(uri, "malformed btih"))?,
                        );
                    }
                }
                "dn" if display_name.is_none() && !value.is_empty() => {
                    display_name = Some(value.into_owned());
                }
                "tr" if !value.is_empty() && !trackers.iter().any(|t| *t == value) => {
                    trackers.push(value.into_owned());
                }
                _ => {}
            }
        }
        let info_hash = info_hash.ok_or_else(|| TransferError::magnet(uri, "missing btih"))?;
        Ok(Self {
            info_hash,
            display_name,
            trackers,
        })
    }
}

impl FromStr for MagnetLink {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn decode_btih(encoded: &str) -> Option<ContentId> {
    match encoded.len() {
        40 => ContentId::from_hex(encoded).ok(),
        32 => decode_base32(encoded).map(ContentId::from_bytes),
        _ => None,
    }
}

fn decode_base32(encoded: &str) -> Option<[u8; ContentId::LEN]> {
    let mut out = [0_u8; ContentId::LEN];
    let mut buffer: u64 = 0;
    let mut bits = 0_u32;
    let mut index = 0;
    for byte in encoded.bytes() {
        let value = match byte.to_ascii_uppercase() {
            upper @ b'A'..=b'Z' => upper - b'A',
            digit @ b'2'..=b'7' => digit - b'2' + 26,
            _ => return None,
        };
        buffer = (buffer << 5) | u64::from(value);
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            *out.get_mut(index)? = u8::try_from((buffer >> bits) & 0xff).ok()?;
            index += 1;
        }
    }
    (index == ContentId::LEN).then_some(out)
}
