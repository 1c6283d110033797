//! Minimal bencode decoder.
//!
//! # Design
//! - Values borrow nothing; byte strings are copied so decoded trees outlive the input.
//! - Top-level dictionary entries also expose their raw encoded span, which is what the
//!   info hash is computed over.
//! - Nesting depth is capped to keep hostile inputs from exhausting the stack.

use std::collections::BTreeMap;

use thiserror::Error;

const MAX_DEPTH: usize = 64;

/// Decoded bencode value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Signed integer.
    Integer(i64),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Ordered list.
    List(Vec<Value>),
    /// Dictionary keyed by byte strings.
    Dict(BTreeMap<Vec<u8>, Value>),
}

impl Value {
    /// Integer payload, if any.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Byte string payload, if any.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Byte string payload decoded as UTF-8, if possible.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// List payload, if any.
    #[must_use]
    pub fn as_list(&self) -> Option<&[Self]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Dictionary payload, if any.
    #[must_use]
    pub const fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, Self>> {
        match self {
            Self::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Dictionary lookup by ASCII key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        self.as_dict().and_then(|dict| dict.get(key.as_bytes()))
    }
}

/// Decoder failures, each carrying the byte offset where decoding stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BencodeError {
    /// Input ended inside a value.
    #[error("unexpected end of input")]
    UnexpectedEof {
        /// Offset of the truncation.
        offset: usize,
    },
    /// Byte cannot start or continue a value.
    #[error("unexpected byte")]
    UnexpectedByte {
        /// Offset of the byte.
        offset: usize,
        /// Offending byte.
        byte: u8,
    },
    /// Integer had a bad sign, leading zero, or overflowed.
    #[error("malformed integer")]
    MalformedInteger {
        /// Offset of the integer.
        offset: usize,
    },
    /// Dictionary key was not a byte string.
    #[error("dictionary key is not a byte string")]
    NonStringKey {
        /// Offset of the key.
        offset: usize,
    },
    /// Extra bytes followed the top-level value.
    #[error("trailing data after value")]
    TrailingData {
        /// Offset of the first extra byte.
        offset: usize,
    },
    /// Nesting exceeded the supported depth.
    #[error("nesting too deep")]
    TooDeep {
        /// Offset where the limit was hit.
        offset: usize,
    },
}

/// Top-level dictionary entry with its raw encoded value.
#[derive(Debug, Clone)]
pub struct RawEntry<'a> {
    /// Entry key.
    pub key: Vec<u8>,
    /// Decoded value.
    pub value: Value,
    /// Exact encoded bytes of the value.
    pub raw: &'a [u8],
}

/// Decode a single value that must span the whole input.
///
/// # Errors
///
/// Returns a [`BencodeError`] for malformed input or trailing bytes.
pub fn decode(input: &[u8]) -> Result<Value, BencodeError> {
    let mut decoder = Decoder::new(input);
    let value = decoder.value(0)?;
    decoder.finish()?;
    Ok(value)
}

/// Decode a top-level dictionary, keeping each value's raw span.
///
/// # Errors
///
/// Returns a [`BencodeError`] when the input is not exactly one dictionary.
pub fn decode_dict_entries(input: &[u8]) -> Result<Vec<RawEntry<'_>>, BencodeError> {
    let mut decoder = Decoder::new(input);
    decoder.expect(b'd')?;
    let mut entries = Vec::new();
    loop {
        if decoder.peek()? == b'e' {
            decoder.pos += 1;
            break;
        }
        let key = decoder.key()?;
        let start = decoder.pos;
        let value = decoder.value(1)?;
        entries.push(RawEntry {
            key,
            value,
            raw: &input[start..decoder.pos],
        });
    }
    decoder.finish()?;
    Ok(entries)
}

struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Result<u8, BencodeError> {
        self.input
            .get(self.pos)
            .copied()
            .ok_or(BencodeError::UnexpectedEof { offset: self.pos })
    }

    fn expect(&mut self, byte: u8) -> Result<(), BencodeError> {
        let found = self.peek()?;
        if found != byte {
            return Err(BencodeError::UnexpectedByte {
                offset: self.pos,
                byte: found,
            });
        }
        self.pos += 1;
        Ok(())
    }

    const fn finish(&self) -> Result<(), BencodeError> {
        if self.pos == self.input.len() {
            Ok(())
        } else {
            Err(BencodeError::TrailingData { offset: self.pos })
        }
    }

    fn value(&mut self, depth: usize) -> Result<Value, BencodeError> {
        if depth > MAX_DEPTH {
            return Err(BencodeError::TooDeep { offset: self.pos });
        }
        match self.peek()? {
            b'i' => self.integer().map(Value::Integer),
            b'0'..=b'9' => self.bytes().map(Value::Bytes),
            b'l' => {
                self.pos += 1;
                let mut items = Vec::new();
                while self.peek()? != b'e' {
                    items.push(self.value(depth + 1)?);
                }
                self.pos += 1;
                Ok(Value::List(items))
            }
            b'd' => {
                self.pos += 1;
                let mut entries = BTreeMap::new();
                while self.peek()? != b'e' {
                    let key = self.key()?;
                    let value = self.value(depth + 1)?;
                    entries.insert(key, value);
                }
                self.pos += 1;
                Ok(Value::Dict(entries))
            }
            byte => Err(BencodeError::UnexpectedByte {
                offset: self.pos,
                byte,
            }),
        }
    }

    fn key(&mut self) -> Result<Vec<u8>, BencodeError> {
        if !self.peek()?.is_ascii_digit() {
            return Err(BencodeError::NonStringKey { offset: self.pos });
        }
        self.bytes()
    }

    fn integer(&mut self) -> Result<i64, BencodeError> {
        let start = self.pos;
        self.expect(b'i')?;
        let digits_start = self.pos;
        while self.peek()? != b'e' {
            self.pos += 1;
        }
        let text = &self.input[digits_start..self.pos];
        self.pos += 1;
        let malformed = BencodeError::MalformedInteger { offset: start };
        let unsigned = text.strip_prefix(b"-").unwrap_or(text);
        let canonical = match unsigned {
            [] => false,
            [b'0'] => text.len() == 1,
            [first, ..] => *first != b'0' && unsigned.iter().all(u8::is_ascii_digit),
        };
        if !canonical {
            return Err(malformed);
        }
        std::str::from_utf8(text)
            .ok()
            .and_then(|digits| digits.parse::<i64>().ok())
            .ok_or(malformed)
    }

    fn bytes(&mut self) -> Result<Vec<u8>, BencodeError> {
        let start = self.pos;
        let mut length: usize = 0;
        loop {
            let byte = self.peek()?;
            if byte == b':' {
                break;
            }
            if !byte.is_ascii_digit() || (self.pos > start && self.input[start] == b'0') {
                return Err(BencodeError::UnexpectedByte {
                    offset: self.pos,
                    byte,
                });
            }
            length = length
                .checked_mul(10)
                .and_then(|value| value.checked_add(usize::from(byte - b'0')))
                .ok_or(BencodeError::MalformedInteger { offset: start })?;
            self.pos += 1;
        }
        self.pos += 1;
        let end = self
            .pos
            .checked_add(length)
            .filter(|end| *end <= self.input.len())
            .ok_or(BencodeError::UnexpectedEof {
                offset: self.input.len(),
            })?;
        let bytes = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_nested_structures() -> Result<(), BencodeError> {
        let value = decode(b"d3:agei42e4:listl1:ai-7ee4:name4:spame")?;
        assert_eq!(value.get("age").and_then(Value::as_integer), Some(42));
        assert_eq!(value.get("name").and_then(Value::as_str), Some("spam"));
        let list = value.get("list").and_then(Value::as_list).unwrap_or_default();
        assert_eq!(list.len(), 2);
        assert_eq!(list[1].as_integer(), Some(-7));
        Ok(())
    }

    #[test]
    fn rejects_non_canonical_integers() {
        for input in [&b"i-0e"[..], b"i03e", b"ie", b"i-e", b"i1x2e"] {
            assert!(
                matches!(decode(input), Err(BencodeError::MalformedInteger { .. })),
                "accepted {input:?}"
            );
        }
        assert_eq!(decode(b"i0e"), Ok(Value::Integer(0)));
    }

    #[test]
    fn rejects_trailing_and_truncated_input() {
        assert_eq!(
            decode(b"i1ei2e"),
            Err(BencodeError::TrailingData { offset: 3 })
        );
        assert!(matches!(
            decode(b"5:abc"),
            Err(BencodeError::UnexpectedEof { .. })
        ));
        assert!(matches!(
            decode(b"l1:a"),
            Err(BencodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn rejects_integer_dictionary_keys() {
        assert!(matches!(
            decode(b"di1e1:ae"),
            Err(BencodeError::NonStringKey { offset: 1 })
        ));
    }

    #[test]
    fn caps_nesting_depth() {
        let mut input = vec![b'l'; MAX_DEPTH + 2];
        input.extend(vec![b'e'; MAX_DEPTH + 2]);
        assert!(matches!(decode(&input), Err(BencodeError::TooDeep { .. })));
    }

    #[test]
    fn raw_entries_expose_exact_spans() -> Result<(), BencodeError> {
        let input = b"d8:announce3:url4:infod4:name1:xee";
        let entries = decode_dict_entries(input)?;
        let info = entries
            .iter()
            .find(|entry| entry.key == b"info")
            .map(|entry| entry.raw);
        assert_eq!(info, Some(&b"d4:name1:xe"[..]));
        Ok(())
    }
}
