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

//! Drover application wiring.
//!
//! Layout: `bootstrap.rs` (service wiring and teardown), `controller.rs` (descriptor event
//! reconciliation and fetch triggers), `error.rs` (application errors and exit codes).

/// Application bootstrap and teardown.
pub mod bootstrap;
/// Session lifecycle controller.
pub mod controller;
/// Application error type.
pub mod error;

pub use bootstrap::{run_app, run_services};
pub use controller::{EventOutcome, FetchOutcome, FetchPlan, FetchReport, SessionController};
pub use error::{AppError, AppResult};
