//! Inputs and policies accepted by the local engine.

use std::path::PathBuf;

/// Default readahead for payload verification reads.
pub const DEFAULT_READAHEAD_BYTES: u64 = 10 << 20;

/// Runtime parameters applied to the local engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root directory for session payloads.
    pub download_dir: PathBuf,
    /// Whether announce URLs from descriptors are ignored.
    pub disable_trackers: bool,
    /// Read buffer size used while verifying payload data.
    pub readahead_bytes: u64,
}

impl EngineConfig {
    /// Configuration with trackers enabled and the default readahead.
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            disable_trackers: false,
            readahead_bytes: DEFAULT_READAHEAD_BYTES,
        }
    }

    /// Apply the tracker policy to a descriptor's announce list.
    #[must_use]
    pub fn effective_trackers(&self, trackers: &[String]) -> Vec<String> {
        if self.disable_trackers {
            Vec::new()
        } else {
            trackers.to_vec()
        }
    }

    pub(crate) fn readahead(&self) -> usize {
        usize::try_from(self.readahead_bytes).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_trackers_strip_announce_urls() {
        let mut config = EngineConfig::new("/data");
        let trackers = vec!["udp://t".to_string()];
        assert_eq!(config.effective_trackers(&trackers), trackers);
        config.disable_trackers = true;
        assert!(config.effective_trackers(&trackers).is_empty());
    }
}
