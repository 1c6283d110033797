//! Validated daemon settings.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Serialize;

/// Log output format requested by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormatSetting {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

/// Settings resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroverConfig {
    /// Watched descriptor directory.
    pub metainfo_dir: PathBuf,
    /// Destination for fetched content.
    pub download_dir: PathBuf,
    /// Whether tracker discovery is suppressed.
    pub disable_trackers: bool,
    /// Read-ahead budget in bytes.
    pub readahead_bytes: u64,
    /// Status surface listen address.
    pub listen_addr: SocketAddr,
    /// Watcher rescan interval.
    pub poll_interval: Duration,
    /// Default tracing filter.
    pub log_level: String,
    /// Requested log format; inferred from the build profile when absent.
    pub log_format: Option<LogFormatSetting>,
}
