//! Command-line flags with environment fallbacks.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::defaults::{
    DEFAULT_LISTEN_ADDR, DEFAULT_LOG_LEVEL, DEFAULT_POLL_INTERVAL_MS, DEFAULT_READAHEAD,
    default_metainfo_dir,
};
use crate::error::ConfigResult;
use crate::model::{DroverConfig, LogFormatSetting};
use crate::validate::{log_level, parse_byte_size, poll_interval};

/// Raw flags as parsed by clap.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "drover",
    version,
    about = "Fetch every torrent described in a watched directory"
)]
pub struct ConfigArgs {
    /// Directory watched for `.torrent` and `.magnet` descriptors
    /// [default: $HOME/.config/transmission/torrents].
    #[arg(long, env = "DROVER_METAINFO_DIR")]
    pub metainfo_dir: Option<PathBuf>,
    /// Destination directory for fetched content.
    #[arg(long, env = "DROVER_DOWNLOAD_DIR", default_value = ".")]
    pub download_dir: PathBuf,
    /// Ignore announce URLs carried by descriptors.
    #[arg(long, env = "DROVER_DISABLE_TRACKERS")]
    pub disable_trackers: bool,
    /// Read-ahead budget, for example `4096`, `512kB`, or `10MiB`.
    #[arg(
        long,
        env = "DROVER_READAHEAD_BYTES",
        default_value = DEFAULT_READAHEAD,
        value_parser = parse_byte_size
    )]
    pub readahead_bytes: u64,
    /// Address the status surface listens on.
    #[arg(long, env = "DROVER_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    pub listen_addr: SocketAddr,
    /// Directory rescan interval in milliseconds.
    #[arg(long, env = "DROVER_POLL_INTERVAL_MS", default_value_t = DEFAULT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
    /// Default tracing filter; `RUST_LOG` takes precedence.
    #[arg(long, env = "DROVER_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
    /// Log output format.
    #[arg(long, env = "DROVER_LOG_FORMAT", value_enum)]
    pub log_format: Option<LogFormatSetting>,
}

impl ConfigArgs {
    /// Validate the flags and resolve defaults into a [`DroverConfig`].
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConfigError`] when a value is out of range or no metainfo directory
    /// can be determined.
    pub fn into_config(self) -> ConfigResult<DroverConfig> {
        let metainfo_dir = match self.metainfo_dir {
            Some(dir) => dir,
            None => default_metainfo_dir()?,
        };
        Ok(DroverConfig {
            metainfo_dir,
            download_dir: self.download_dir,
            disable_trackers: self.disable_trackers,
            readahead_bytes: self.readahead_bytes,
            listen_addr: self.listen_addr,
            poll_interval: poll_interval(self.poll_interval_ms)?,
            log_level: log_level(&self.log_level)?,
            log_format: self.log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Result<ConfigArgs, clap::Error> {
        ConfigArgs::try_parse_from(std::iter::once("drover").chain(args.iter().copied()))
    }

    #[test]
    fn explicit_flags_are_applied() -> Result<(), Box<dyn std::error::Error>> {
        let config = parse(&[
            "--metainfo-dir",
            "/watch",
            "--download-dir",
            "/data",
            "--disable-trackers",
            "--readahead-bytes",
            "1MiB",
            "--listen-addr",
            "0.0.0.0:9000",
            "--poll-interval-ms",
            "250",
            "--log-format",
            "json",
        ])?
        .into_config()?;
        assert_eq!(config.metainfo_dir, PathBuf::from("/watch"));
        assert_eq!(config.download_dir, PathBuf::from("/data"));
        assert!(config.disable_trackers);
        assert_eq!(config.readahead_bytes, 1 << 20);
        assert_eq!(config.listen_addr.port(), 9000);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.log_format, Some(LogFormatSetting::Json));
        Ok(())
    }

    #[test]
    fn defaults_match_documented_values() -> Result<(), Box<dyn std::error::Error>> {
        let args = parse(&["--metainfo-dir", "/watch"])?;
        assert_eq!(args.readahead_bytes, 10 << 20);
        assert_eq!(args.download_dir, PathBuf::from("."));
        assert!(!args.disable_trackers);
        let config = args.into_config()?;
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.listen_addr.to_string(), "127.0.0.1:7070");
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() -> Result<(), Box<dyn std::error::Error>> {
        assert!(parse(&["--readahead-bytes", "lots"]).is_err());
        assert!(parse(&["--readahead-bytes", "17179869183GiB"]).is_err());
        assert!(parse(&["--listen-addr", "nowhere"]).is_err());
        let short_poll = parse(&["--metainfo-dir", "/w", "--poll-interval-ms", "1"])?;
        assert!(short_poll.into_config().is_err());
        Ok(())
    }

    #[test]
    fn config_serializes_for_startup_logging() -> Result<(), Box<dyn std::error::Error>> {
        let config = parse(&["--metainfo-dir", "/watch"])?.into_config()?;
        let json = serde_json::to_value(&config)?;
        assert_eq!(json["metainfo_dir"], "/watch");
        assert_eq!(json["readahead_bytes"], 10_485_760);
        Ok(())
    }
}
