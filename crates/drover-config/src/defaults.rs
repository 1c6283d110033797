//! Default values applied when a flag and its environment variable are both absent.

use std::path::PathBuf;

use crate::error::{ConfigError, ConfigResult};

/// Default read-ahead budget (10 MiB).
pub const DEFAULT_READAHEAD: &str = "10MiB";
/// Largest accepted read-ahead budget (1 GiB).
pub const MAX_READAHEAD_BYTES: u64 = 1 << 30;
/// Default status listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7070";
/// Default watcher rescan interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Smallest accepted watcher rescan interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 50;
/// Default tracing filter.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// `$HOME/.config/transmission/torrents`.
///
/// # Errors
///
/// Returns [`ConfigError::MissingHome`] when `HOME` is unset or empty.
pub fn default_metainfo_dir() -> ConfigResult<PathBuf> {
    metainfo_dir_under(std::env::var_os("HOME").map(PathBuf::from))
}

pub(crate) fn metainfo_dir_under(home: Option<PathBuf>) -> ConfigResult<PathBuf> {
    home.filter(|home| !home.as_os_str().is_empty())
        .map(|home| home.join(".config").join("transmission").join("torrents"))
        .ok_or(ConfigError::MissingHome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metainfo_dir_is_rooted_at_home() {
        let dir = metainfo_dir_under(Some(PathBuf::from("/home/u")));
        assert_eq!(
            dir.ok(),
            Some(PathBuf::from("/home/u/.config/transmission/torrents"))
        );
    }

    #[test]
    fn missing_home_is_an_error() {
        assert!(matches!(
            metainfo_dir_under(None),
            Err(ConfigError::MissingHome)
        ));
        assert!(matches!(
            metainfo_dir_under(Some(PathBuf::new())),
            Err(ConfigError::MissingHome)
        ));
    }
}
