//! On-disk piece verification.
//!
//! # Design
//! - Files are streamed in layout order, so each piece is hashed with one sequential pass.
//! - Missing or short files contribute zero bytes; the piece is then partial or absent.
//! - Read failures are treated like missing data and never abort the scan.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use drover_core::{FileEntry, Metainfo, PieceState};
use sha1::{Digest, Sha1};
use tracing::debug;

const MIN_READAHEAD: usize = 4 * 1024;
const MAX_READAHEAD: usize = 1 << 30;
const CHUNK: usize = 64 * 1024;

/// Verify every piece of `meta` against the payload under `root`.
pub(crate) fn scan(root: &Path, meta: &Metainfo, readahead: usize) -> Vec<PieceState> {
    let mut reader = LayoutReader::new(root, &meta.files, readahead);
    (0..meta.piece_count())
        .map(|index| {
            let size = meta.piece_size(index);
            let mut hasher = Sha1::new();
            let present = reader.read_into(size, &mut hasher);
            if present == size && hasher.finalize().as_slice() == meta.piece_hashes[index] {
                PieceState::Complete
            } else if present > 0 {
                PieceState::Partial
            } else {
                PieceState::Absent
            }
        })
        .collect()
}

struct LayoutReader<'a> {
    root: &'a Path,
    files: &'a [FileEntry],
    readahead: usize,
    index: usize,
    offset: u64,
    current: Option<BufReader<File>>,
    buffer: Vec<u8>,
}

impl<'a> LayoutReader<'a> {
    fn new(root: &'a Path, files: &'a [FileEntry], readahead: usize) -> Self {
        Self {
            root,
            files,
            readahead: readahead.clamp(MIN_READAHEAD, MAX_READAHEAD),
            index: 0,
            offset: 0,
            current: None,
            buffer: vec![0; CHUNK],
        }
    }

    /// Feed up to `size` layout bytes into `hasher`, returning how many were present.
    fn read_into(&mut self, size: u64, hasher: &mut Sha1) -> u64 {
        let mut remaining = size;
        let mut present = 0;
        let files = self.files;
        while remaining > 0 && self.index < files.len() {
            let file = &files[self.index];
            if self.offset == 0 && self.current.is_none() {
                self.current = self.open(file);
            }
            let take = remaining.min(file.length - self.offset);
            present += self.consume(take, hasher);
            self.offset += take;
            remaining -= take;
            if self.offset >= file.length {
                self.index += 1;
                self.offset = 0;
                self.current = None;
            }
        }
        present
    }

    fn open(&self, file: &FileEntry) -> Option<BufReader<File>> {
        let path = self.root.join(&file.path);
        match File::open(&path) {
            Ok(handle) => Some(BufReader::with_capacity(self.readahead, handle)),
            Err(err) => {
                if err.kind() != ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "payload file unreadable");
                }
                None
            }
        }
    }

    fn consume(&mut self, take: u64, hasher: &mut Sha1) -> u64 {
        let Some(reader) = self.current.as_mut() else {
            return 0;
        };
        let mut consumed = 0;
        while consumed < take {
            let want = usize::try_from(take - consumed)
                .unwrap_or(usize::MAX)
                .min(self.buffer.len());
            match reader.read(&mut self.buffer[..want]) {
                Ok(0) => break,
                Ok(read) => {
                    hasher.update(&self.buffer[..read]);
                    consumed += read as u64;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    debug!(error = %err, "payload read failed");
                    self.current = None;
                    break;
                }
            }
        }
        consumed
    }
}
