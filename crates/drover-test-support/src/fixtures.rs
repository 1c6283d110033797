//! Descriptor and payload builders for tests.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use drover_core::ContentId;
use sha1::{Digest, Sha1};

/// Builder for bencoded metainfo plus the payload it describes.
#[derive(Debug, Clone)]
pub struct MetainfoFixture {
    name: String,
    piece_length: u64,
    layout: Layout,
    trackers: Vec<String>,
}

#[derive(Debug, Clone)]
enum Layout {
    Single(Vec<u8>),
    Multi(Vec<(Vec<String>, Vec<u8>)>),
}

impl MetainfoFixture {
    /// Single-file content named `name`.
    #[must_use]
    pub fn single(name: &str, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.to_string(),
            piece_length: 16,
            layout: Layout::Single(content.into()),
            trackers: Vec::new(),
        }
    }

    /// Multi-file content rooted at directory `name`; add files with [`Self::file`].
    #[must_use]
    pub fn multi(name: &str) -> Self {
        Self {
            name: name.to_string(),
            piece_length: 16,
            layout: Layout::Multi(Vec::new()),
            trackers: Vec::new(),
        }
    }

    /// Append a file to a multi-file layout. Ignored for single-file layouts.
    #[must_use]
    pub fn file(mut self, segments: &[&str], content: impl Into<Vec<u8>>) -> Self {
        if let Layout::Multi(files) = &mut self.layout {
            files.push((
                segments.iter().map(ToString::to_string).collect(),
                content.into(),
            ));
        }
        self
    }

    /// Override the piece length (default 16 bytes).
    #[must_use]
    pub const fn piece_length(mut self, piece_length: u64) -> Self {
        self.piece_length = piece_length;
        self
    }

    /// Add an announce URL.
    #[must_use]
    pub fn tracker(mut self, url: &str) -> Self {
        self.trackers.push(url.to_string());
        self
    }

    /// Content identifier the engine will derive.
    #[must_use]
    pub fn content_id(&self) -> ContentId {
        ContentId::digest(&self.info_bytes())
    }

    /// Total payload length.
    #[must_use]
    pub fn total_length(&self) -> u64 {
        self.payload().len() as u64
    }

    /// Number of pieces.
    #[must_use]
    pub fn piece_count(&self) -> usize {
        self.pieces().len()
    }

    /// Encoded metainfo file.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = b"d".to_vec();
        if let Some(first) = self.trackers.first() {
            put_bytes(&mut out, b"announce");
            put_bytes(&mut out, first.as_bytes());
            put_bytes(&mut out, b"announce-list");
            out.push(b'l');
            for tracker in &self.trackers {
                out.push(b'l');
                put_bytes(&mut out, tracker.as_bytes());
                out.push(b'e');
            }
            out.push(b'e');
        }
        put_bytes(&mut out, b"info");
        out.extend(self.info_bytes());
        out.push(b'e');
        out
    }

    /// Encoded `info` dictionary.
    #[must_use]
    pub fn info_bytes(&self) -> Vec<u8> {
        let mut out = b"d".to_vec();
        match &self.layout {
            Layout::Single(content) => {
                put_bytes(&mut out, b"length");
                put_int(&mut out, content.len() as u64);
            }
            Layout::Multi(files) => {
                put_bytes(&mut out, b"files");
                out.push(b'l');
                for (segments, content) in files {
                    out.push(b'd');
                    put_bytes(&mut out, b"length");
                    put_int(&mut out, content.len() as u64);
                    put_bytes(&mut out, b"path");
                    out.push(b'l');
                    for segment in segments {
                        put_bytes(&mut out, segment.as_bytes());
                    }
                    out.extend(b"ee");
                }
                out.push(b'e');
            }
        }
        put_bytes(&mut out, b"name");
        put_bytes(&mut out, self.name.as_bytes());
        put_bytes(&mut out, b"piece length");
        put_int(&mut out, self.piece_length);
        put_bytes(&mut out, b"pieces");
        put_bytes(&mut out, &self.pieces().concat());
        out.push(b'e');
        out
    }

    /// Write the metainfo file as `dir/file_name`.
    ///
    /// # Errors
    ///
    /// Propagates filesystem failures.
    pub fn write_descriptor(&self, dir: &Path, file_name: &str) -> io::Result<PathBuf> {
        let path = dir.join(file_name);
        fs::write(&path, self.encode())?;
        Ok(path)
    }

    /// Write the full payload beneath `root` as an engine would lay it out.
    ///
    /// # Errors
    ///
    /// Propagates filesystem failures.
    pub fn write_payload(&self, root: &Path) -> io::Result<()> {
        for (path, content) in self.files() {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content)?;
        }
        Ok(())
    }

    fn files(&self) -> Vec<(PathBuf, &[u8])> {
        match &self.layout {
            Layout::Single(content) => vec![(PathBuf::from(&self.name), content.as_slice())],
            Layout::Multi(files) => files
                .iter()
                .map(|(segments, content)| {
                    let mut path = PathBuf::from(&self.name);
                    path.extend(segments);
                    (path, content.as_slice())
                })
                .collect(),
        }
    }

    fn payload(&self) -> Vec<u8> {
        self.files()
            .into_iter()
            .flat_map(|(_, content)| content.iter().copied())
            .collect()
    }

    fn pieces(&self) -> Vec<[u8; 20]> {
        let chunk = usize::try_from(self.piece_length.max(1)).unwrap_or(usize::MAX);
        self.payload()
            .chunks(chunk)
            .map(|piece| {
                let mut hash = [0_u8; 20];
                hash.copy_from_slice(&Sha1::digest(piece));
                hash
            })
            .collect()
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend(bytes.len().to_string().as_bytes());
    out.push(b':');
    out.extend(bytes);
}

fn put_int(out: &mut Vec<u8>, value: u64) {
    out.push(b'i');
    out.extend(value.to_string().as_bytes());
    out.push(b'e');
}

/// Magnet URI for an identifier with an optional display name.
#[must_use]
pub fn magnet_uri(id: ContentId, name: Option<&str>) -> String {
    let mut uri = format!("magnet:?xt=urn:btih:{id}");
    if let Some(name) = name {
        uri.push_str("&dn=");
        uri.extend(url::form_urlencoded::byte_serialize(name.as_bytes()));
    }
    uri
}

/// Deterministic identifier for tests that do not need a real descriptor.
#[must_use]
pub const fn content_id(seed: u8) -> ContentId {
    ContentId::from_bytes([seed; ContentId::LEN])
}
