//! Descriptor formats understood by the watcher and engines.
//!
//! Two kinds live in a watched directory: `.torrent` metainfo files and `.magnet` files
//! holding one magnet URI per non-blank line (`#` starts a comment line).

pub mod bencode;
mod magnet;
mod metainfo;

use std::path::Path;

pub use magnet::MagnetLink;
pub use metainfo::{FileEntry, Metainfo};

/// Descriptor file kinds recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    /// `.torrent` metainfo file.
    Metainfo,
    /// `.magnet` file with magnet URIs.
    MagnetList,
}

impl DescriptorKind {
    /// Classify a path by its (case-insensitive) extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;
        if extension.eq_ignore_ascii_case("torrent") {
            Some(Self::Metainfo)
        } else if extension.eq_ignore_ascii_case("magnet") {
            Some(Self::MagnetList)
        } else {
            None
        }
    }
}

/// Magnet URI lines of a `.magnet` file, trimmed, skipping blanks and comments.
pub fn magnet_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_extension() {
        assert_eq!(
            DescriptorKind::from_path(Path::new("/w/a.TORRENT")),
            Some(DescriptorKind::Metainfo)
        );
        assert_eq!(
            DescriptorKind::from_path(Path::new("b.magnet")),
            Some(DescriptorKind::MagnetList)
        );
        assert_eq!(DescriptorKind::from_path(Path::new("c.txt")), None);
        assert_eq!(DescriptorKind::from_path(Path::new("torrent")), None);
    }

    #[test]
    fn magnet_lines_skip_comments_and_blanks() {
        let text = "# saved links\n\n  magnet:?xt=a  \r\nmagnet:?xt=b\n#magnet:?xt=c\n";
        let lines: Vec<&str> = magnet_lines(text).collect();
        assert_eq!(lines, vec!["magnet:?xt=a", "magnet:?xt=b"]);
    }
}
