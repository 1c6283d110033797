//! Directory scanning and descriptor parsing with a per-file cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use drover_core::descriptor::magnet_lines;
use drover_core::{ContentId, DescriptorKind, DescriptorSource, MagnetLink, Metainfo};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{WatchError, WatchResult};

/// Identifiers currently described by the directory, each with its preferred source.
pub(crate) type Catalog = BTreeMap<ContentId, DescriptorSource>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: Option<SystemTime>,
    len: u64,
}

#[derive(Debug)]
struct CachedFile {
    stamp: Stamp,
    entries: Vec<(ContentId, DescriptorSource)>,
}

/// Scans one directory level, re-parsing a file only when its mtime or length changes.
#[derive(Debug)]
pub(crate) struct DirectoryScanner {
    dir: PathBuf,
    cache: HashMap<PathBuf, CachedFile>,
}

impl DirectoryScanner {
    pub(crate) fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache: HashMap::new(),
        }
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Build the current catalog.
    ///
    /// # Errors
    ///
    /// Fails only when the directory itself cannot be listed.
    pub(crate) fn scan(&mut self) -> WatchResult<Catalog> {
        let mut catalog = Catalog::new();
        let mut seen = HashSet::new();
        let walker = WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(WatchError::walkdir("scan.read_dir", &self.dir, err));
                }
                Err(err) => {
                    debug!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(kind) = DescriptorKind::from_path(path) else {
                continue;
            };
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping descriptor without metadata");
                    continue;
                }
            };
            let stamp = Stamp {
                modified: metadata.modified().ok(),
                len: metadata.len(),
            };
            seen.insert(path.to_path_buf());
            let fresh = self
                .cache
                .get(path)
                .is_some_and(|cached| cached.stamp == stamp);
            if !fresh {
                let entries = parse_descriptor(kind, path);
                self.cache
                    .insert(path.to_path_buf(), CachedFile { stamp, entries });
            }
            if let Some(cached) = self.cache.get(path) {
                for (id, source) in &cached.entries {
                    merge(&mut catalog, *id, source);
                }
            }
        }
        self.cache.retain(|path, _| seen.contains(path));
        Ok(catalog)
    }
}

/// Keep the first source for an identifier, preferring metainfo over magnet links.
fn merge(catalog: &mut Catalog, id: ContentId, source: &DescriptorSource) {
    match catalog.get(&id) {
        Some(existing) if existing.has_metadata() || !source.has_metadata() => {}
        _ => {
            catalog.insert(id, source.clone());
        }
    }
}

fn parse_descriptor(kind: DescriptorKind, path: &Path) -> Vec<(ContentId, DescriptorSource)> {
    match kind {
        DescriptorKind::Metainfo => match Metainfo::from_file(path) {
            Ok(metainfo) => vec![(metainfo.info_hash, DescriptorSource::file(path))],
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unparseable metainfo");
                Vec::new()
            }
        },
        DescriptorKind::MagnetList => {
            let contents = match fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable magnet file");
                    return Vec::new();
                }
            };
            magnet_lines(&contents)
                .filter_map(|line| match MagnetLink::parse(line) {
                    Ok(link) => Some((link.info_hash, DescriptorSource::uri(line))),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "skipping unparseable magnet line");
                        None
                    }
                })
                .collect()
        }
    }
}
