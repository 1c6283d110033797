//! Metainfo (`.torrent`) parsing.

use std::path::{Path, PathBuf};

use crate::descriptor::bencode::{self, Value};
use crate::error::{TransferError, TransferResult};
use crate::model::ContentId;

const PIECE_HASH_LEN: usize = 20;

/// File inside a metainfo layout, relative to the download directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Relative path, rooted at the content name for multi-file layouts.
    pub path: PathBuf,
    /// Length in bytes.
    pub length: u64,
}

/// Validated metainfo descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metainfo {
    /// SHA-1 of the raw `info` dictionary.
    pub info_hash: ContentId,
    /// Content name.
    pub name: String,
    /// Nominal piece size in bytes.
    pub piece_length: u64,
    /// Expected SHA-1 of each piece.
    pub piece_hashes: Vec<[u8; PIECE_HASH_LEN]>,
    /// Files in layout order.
    pub files: Vec<FileEntry>,
    /// Announce URLs, deduplicated in tier order.
    pub trackers: Vec<String>,
    total_length: u64,
}

impl Metainfo {
    /// Read and parse a metainfo file.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::DescriptorIo`] if the file cannot be read, or a parse error.
    pub fn from_file(path: &Path) -> TransferResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| TransferError::DescriptorIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parse bencoded metainfo bytes.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed bencode or a structurally invalid layout.
    pub fn from_bytes(bytes: &[u8]) -> TransferResult<Self> {
        let entries = bencode::decode_dict_entries(bytes)?;
        let mut info = None;
        let mut announce = None;
        let mut announce_list = None;
        for entry in entries {
            match entry.key.as_slice() {
                b"info" => info = Some((entry.value, ContentId::digest(entry.raw))),
                b"announce" => announce = Some(entry.value),
                b"announce-list" => announce_list = Some(entry.value),
                _ => {}
            }
        }
        let (info, info_hash) = info.ok_or(TransferError::invalid("missing info dictionary"))?;
        if info.as_dict().is_none() {
            return Err(TransferError::invalid("info is not a dictionary"));
        }

        let name = info
            .get("name.utf-8")
            .or_else(|| info.get("name"))
            .and_then(Value::as_str)
            .ok_or(TransferError::invalid("missing or non-utf8 name"))?
            .to_string();
        if !is_safe_segment(&name) {
            return Err(TransferError::invalid("unsafe content name"));
        }

        let piece_length = info
            .get("piece length")
            .and_then(Value::as_integer)
            .and_then(|value| u64::try_from(value).ok())
            .filter(|value| *value > 0)
            .ok_or(TransferError::invalid("missing or non-positive piece length"))?;

        let pieces = info
            .get("pieces")
            .and_then(Value::as_bytes)
            .ok_or(TransferError::invalid("missing pieces"))?;
        if pieces.len() % PIECE_HASH_LEN != 0 {
            return Err(TransferError::invalid(
                "pieces length is not a multiple of 20",
            ));
        }
        let piece_hashes: Vec<[u8; PIECE_HASH_LEN]> = pieces
            .chunks_exact(PIECE_HASH_LEN)
            .map(|chunk| {
                let mut hash = [0_u8; PIECE_HASH_LEN];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let files = parse_files(&info, &name)?;
        let total = files
            .iter()
            .try_fold(0_u64, |total, file| total.checked_add(file.length))
            .ok_or(TransferError::invalid("content too large"))?;
        let expected = usize::try_from(total.div_ceil(piece_length))
            .map_err(|_| TransferError::invalid("content too large"))?;
        if expected != piece_hashes.len() {
            return Err(TransferError::invalid(
                "piece count does not match total length",
            ));
        }

        Ok(Self {
            info_hash,
            name,
            piece_length,
            piece_hashes,
            files,
            trackers: collect_trackers(announce.as_ref(), announce_list.as_ref()),
            total_length: total,
        })
    }

    /// Sum of all file lengths.
    #[must_use]
    pub const fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Number of pieces.
    #[must_use]
    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Size of the piece at `index`; the last piece may be short.
    #[must_use]
    pub fn piece_size(&self, index: usize) -> u64 {
        let start = (index as u64).saturating_mul(self.piece_length);
        self.total_length()
            .saturating_sub(start)
            .min(self.piece_length)
    }
}

fn parse_files(info: &Value, name: &str) -> TransferResult<Vec<FileEntry>> {
    if let Some(length) = info.get("length") {
        let length = non_negative(length, "invalid file length")?;
        return Ok(vec![FileEntry {
            path: PathBuf::from(name),
            length,
        }]);
    }
    let list = info
        .get("files")
        .and_then(Value::as_list)
        .ok_or(TransferError::invalid("missing length and files"))?;
    if list.is_empty() {
        return Err(TransferError::invalid("empty file list"));
    }
    let mut files = Vec::with_capacity(list.len());
    for item in list {
        let length = item
            .get("length")
            .ok_or(TransferError::invalid("file entry missing length"))
            .and_then(|value| non_negative(value, "invalid file length"))?;
        let segments = item
            .get("path.utf-8")
            .or_else(|| item.get("path"))
            .and_then(Value::as_list)
            .filter(|segments| !segments.is_empty())
            .ok_or(TransferError::invalid("file entry missing path"))?;
        let mut path = PathBuf::from(name);
        for segment in segments {
            let segment = segment
                .as_str()
                .filter(|segment| is_safe_segment(segment))
                .ok_or(TransferError::invalid("unsafe file path segment"))?;
            path.push(segment);
        }
        files.push(FileEntry { path, length });
    }
    Ok(files)
}

fn non_negative(value: &Value, reason: &'static str) -> TransferResult<u64> {
    value
        .as_integer()
        .and_then(|value| u64::try_from(value).ok())
        .ok_or(TransferError::invalid(reason))
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}

fn collect_trackers(announce: Option<&Value>, announce_list: Option<&Value>) -> Vec<String> {
    let mut trackers: Vec<String> = Vec::new();
    let mut push = |value: &Value| {
        if let Some(url) = value.as_str().map(str::trim).filter(|url| !url.is_empty())
            && !trackers.iter().any(|known| known == url)
        {
            trackers.push(url.to_string());
        }
    };
    if let Some(tiers) = announce_list.and_then(Value::as_list) {
        for tier in tiers {
            for url in tier.as_list().unwrap_or_default() {
                push(url);
            }
        }
    }
    if let Some(announce) = announce {
        push(announce);
    }
    trackers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_file(length: u64, piece_length: u64, pieces: usize) -> Vec<u8> {
        let hashes = vec![0xAA_u8; pieces * PIECE_HASH_LEN];
        let mut out = b"d8:announce14:http://t/annou4:infod6:lengthi".to_vec();
        out.extend(length.to_string().as_bytes());
        out.extend(b"e4:name8:data.bin12:piece lengthi");
        out.extend(piece_length.to_string().as_bytes());
        out.extend(b"e6:pieces");
        out.extend(hashes.len().to_string().as_bytes());
        out.push(b':');
        out.extend(&hashes);
        out.extend(b"ee");
        out
    }

    #[test]
    fn parses_single_file_layout() -> TransferResult<()> {
        let meta = Metainfo::from_bytes(&single_file(40, 16, 3))?;
        assert_eq!(meta.name, "data.bin");
        assert_eq!(meta.total_length(), 40);
        assert_eq!(meta.piece_count(), 3);
        assert_eq!(meta.piece_size(0), 16);
        assert_eq!(meta.piece_size(2), 8);
        assert_eq!(meta.files[0].path, PathBuf::from("data.bin"));
        assert_eq!(meta.trackers, vec!["http://t/annou".to_string()]);
        Ok(())
    }

    #[test]
    fn info_hash_covers_raw_info_bytes() -> TransferResult<()> {
        let bytes = single_file(16, 16, 1);
        let meta = Metainfo::from_bytes(&bytes)?;
        let start = bytes
            .windows(5)
            .position(|window| window == b"4:inf")
            .map_or(0, |pos| pos + 6);
        let raw_info = &bytes[start..bytes.len() - 1];
        assert_eq!(meta.info_hash, ContentId::digest(raw_info));
        Ok(())
    }

    #[test]
    fn rejects_inconsistent_piece_count() {
        let err = Metainfo::from_bytes(&single_file(40, 16, 2));
        assert!(matches!(
            err,
            Err(TransferError::InvalidDescriptor {
                reason: "piece count does not match total length"
            })
        ));
    }

    #[test]
    fn rejects_missing_info_and_garbage() {
        assert!(matches!(
            Metainfo::from_bytes(b"d8:announce1:xe"),
            Err(TransferError::InvalidDescriptor { .. })
        ));
        assert!(matches!(
            Metainfo::from_bytes(b"not bencode"),
            Err(TransferError::Bencode { .. })
        ));
    }

    #[test]
    fn rejects_parent_directory_segments() {
        let hashes = [0_u8; PIECE_HASH_LEN];
        let mut bytes =
            b"d4:infod5:filesld6:lengthi4e4:pathl2:..6:escapeee4:name3:dir12:piece lengthi16e6:pieces20:"
                .to_vec();
        bytes.extend(hashes);
        bytes.extend(b"ee");
        assert!(matches!(
            Metainfo::from_bytes(&bytes),
            Err(TransferError::InvalidDescriptor {
                reason: "unsafe file path segment"
            })
        ));
    }

    #[test]
    fn rejects_file_lengths_that_overflow() {
        let max = i64::MAX;
        let mut bytes = b"d4:infod5:filesl".to_vec();
        for segment in ["a", "b", "c"] {
            bytes.extend(format!("d6:lengthi{max}e4:pathl1:{segment}ee").as_bytes());
        }
        bytes.extend(b"e4:name3:dir12:piece lengthi16e6:pieces20:");
        bytes.extend([0_u8; PIECE_HASH_LEN]);
        bytes.extend(b"ee");
        assert!(matches!(
            Metainfo::from_bytes(&bytes),
            Err(TransferError::InvalidDescriptor {
                reason: "content too large"
            })
        ));
    }

    #[test]
    fn multi_file_paths_are_rooted_at_name() -> TransferResult<()> {
        let hashes = [0_u8; PIECE_HASH_LEN];
        let mut bytes = b"d4:infod5:filesld6:lengthi4e4:pathl1:a1:beed6:lengthi3e4:pathl1:ceee4:name3:dir12:piece lengthi16e6:pieces20:".to_vec();
        bytes.extend(hashes);
        bytes.extend(b"ee");
        let meta = Metainfo::from_bytes(&bytes)?;
        let paths: Vec<PathBuf> = meta.files.iter().map(|file| file.path.clone()).collect();
        assert_eq!(
            paths,
            vec![PathBuf::from("dir/a/b"), PathBuf::from("dir/c")]
        );
        assert_eq!(meta.total_length(), 7);
        assert!(meta.trackers.is_empty());
        Ok(())
    }
}
