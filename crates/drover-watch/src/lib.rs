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

//! Polling watcher that reports descriptor files appearing in and leaving a directory.
//!
//! # Design
//! - One directory level is rescanned on a fixed interval; no platform notification APIs.
//! - Files are re-parsed only when their modification time or length changes.
//! - Events are keyed by content identifier, so renames and duplicate descriptors are quiet.
//! - A directory that can no longer be listed ends the stream with a terminal error.

mod error;
mod scan;
mod watcher;

pub use error::{WatchError, WatchResult};
pub use watcher::{DescriptorStream, DirWatcher, WatchRegistration};
