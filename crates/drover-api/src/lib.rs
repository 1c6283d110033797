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

//! Read-only HTTP status surface over a transfer engine.
//!
//! # Design
//! - Every handler re-queries the engine; nothing is cached between requests.
//! - Each request takes one engine snapshot, so a response never mixes two registry states.
//! - No write routes and no authentication: the surface is an operator-local diagnostic.

pub mod error;
mod http;
mod state;

pub use error::{ApiServerError, ApiServerResult};
pub use http::router::StatusServer;
