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

//! Engine-agnostic transfer session interfaces, descriptor parsing, and status reporting.
//!
//! Layout: `model/` (identifiers, events, piece state, snapshots), `service/` (engine and
//! session traits), `descriptor/` (bencode, metainfo, and magnet parsing), `report.rs`
//! (status summary rendering), `error.rs` (shared error type).

pub mod descriptor;
pub mod error;
pub mod model;
pub mod report;
pub mod service;

pub use descriptor::{DescriptorKind, FileEntry, MagnetLink, Metainfo};
pub use error::{TransferError, TransferResult};
pub use model::{
    ContentId, DescriptorEvent, DescriptorSource, MetadataReadiness, PieceState, PieceStateRun,
    SessionPhase, SessionSnapshot,
};
pub use report::{PieceTally, humanize_bytes, render_summary, summary_line};
pub use service::{SessionHandle, TransferEngine, TransferSession};
