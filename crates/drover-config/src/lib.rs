#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls
)]
#![warn(missing_docs, unreachable_pub)]

//! Startup configuration for the drover daemon.
//! Layout: cli.rs (flags and environment), model.rs (validated settings), validate.rs
//! (value parsers and checks), defaults.rs (default values), error.rs (config errors).

pub mod cli;
pub mod defaults;
pub mod error;
pub mod model;
pub mod validate;

pub use cli::ConfigArgs;
pub use error::{ConfigError, ConfigResult};
pub use model::{DroverConfig, LogFormatSetting};
