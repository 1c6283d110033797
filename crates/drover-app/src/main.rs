#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Binary entrypoint: watch a descriptor directory and fetch everything it describes.

use std::error::Error;
use std::process::ExitCode;

use drover_app::run_app;

/// Runs until interrupted; exits `1` on startup or watcher failure.
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let mut message = err.to_string();
            let mut source = err.source();
            while let Some(cause) = source {
                message.push_str(": ");
                message.push_str(&cause.to_string());
                source = cause.source();
            }
            eprintln!("drover: {message}");
            ExitCode::from(err.exit_code())
        }
    }
}
