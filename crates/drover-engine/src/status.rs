//! Free-form engine status dump served on the raw status route.

use std::fmt::Write as _;

use drover_core::{DescriptorSource, PieceStateRun, SessionSnapshot};

use crate::types::EngineConfig;

/// Render the engine header followed by one block per session.
pub(crate) fn render(config: &EngineConfig, sessions: &[SessionSnapshot]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "drover local engine");
    let _ = writeln!(out, "download dir: {}", config.download_dir.display());
    let _ = writeln!(
        out,
        "trackers: {}",
        if config.disable_trackers {
            "disabled"
        } else {
            "enabled"
        }
    );
    let _ = writeln!(out, "readahead: {} bytes", config.readahead_bytes);
    let _ = writeln!(out, "sessions: {}", sessions.len());
    for session in sessions {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {:?}", session.id, session.name);
        let _ = writeln!(out, "  phase: {}", session.phase.as_str());
        let _ = writeln!(
            out,
            "  progress: {}/{} bytes",
            session.bytes_completed, session.total_length
        );
        let _ = writeln!(
            out,
            "  pieces: {} [{}]",
            session.piece_count,
            run_notation(&session.piece_state_runs)
        );
        if !session.trackers.is_empty() {
            let _ = writeln!(out, "  trackers: {}", session.trackers.join(", "));
        }
        let origin = match &session.origin {
            DescriptorSource::File { path } => path.display().to_string(),
            DescriptorSource::Uri { uri } => uri.clone(),
        };
        let _ = writeln!(out, "  origin: {origin}");
        let _ = writeln!(out, "  added: {}", session.added_at.to_rfc3339());
    }
    out
}

fn run_notation(runs: &[PieceStateRun]) -> String {
    runs.iter()
        .map(|run| format!("{}{}", run.length, run.state.code()))
        .collect::<Vec<_>>()
        .join(" ")
}
