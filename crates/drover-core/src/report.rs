//! Human-readable status summary.
//!
//! # Design
//! - One line per session, sorted by the canonical hex identifier.
//! - Byte sizes use decimal SI units with one decimal below ten (`1.0 kB`, `250 B`).
//! - Rendering is pure; callers supply snapshots taken from the engine.

use std::fmt::Write as _;

use crate::model::{PieceStateRun, SessionSnapshot};

const SIZE_UNITS: [&str; 7] = ["B", "kB", "MB", "GB", "TB", "PB", "EB"];

/// Completed and partial piece totals for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PieceTally {
    /// Pieces in complete runs.
    pub completed: usize,
    /// Pieces in partial runs.
    pub partial: usize,
}

impl PieceTally {
    /// Sum run lengths by state.
    #[must_use]
    pub fn from_runs(runs: &[PieceStateRun]) -> Self {
        runs.iter().fold(Self::default(), |mut tally, run| {
            if run.complete() {
                tally.completed += run.length;
            }
            if run.partial() {
                tally.partial += run.length;
            }
            tally
        })
    }
}

/// Render the summary for every snapshot, sorted by identifier.
#[must_use]
pub fn render_summary(mut sessions: Vec<SessionSnapshot>) -> String {
    sessions.sort_by(|a, b| a.id.cmp(&b.id));
    sessions.iter().fold(String::new(), |mut out, session| {
        out.push_str(&summary_line(session));
        out
    })
}

/// Render one newline-terminated summary line.
#[must_use]
pub fn summary_line(session: &SessionSnapshot) -> String {
    let tally = PieceTally::from_runs(&session.piece_state_runs);
    let mut line = String::new();
    let _ = writeln!(
        line,
        "downloading {:?}: {}/{}, {}/{} pieces completed ({} partial)",
        session.name,
        humanize_bytes(session.bytes_completed),
        humanize_bytes(session.total_length),
        tally.completed,
        session.piece_count,
        tally.partial,
    );
    line
}

/// Format a byte count with decimal SI units.
#[must_use]
pub fn humanize_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }
    let mut exponent = 0;
    let mut scale = 1_u64;
    while exponent + 1 < SIZE_UNITS.len() && bytes / scale >= 1000 {
        scale *= 1000;
        exponent += 1;
    }
    let value = (to_f64(bytes) / to_f64(scale)).mul_add(10.0, 0.5).floor() / 10.0;
    let unit = SIZE_UNITS[exponent];
    if value < 10.0 {
        format!("{value:.1} {unit}")
    } else {
        format!("{value:.0} {unit}")
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "display rounding tolerates precision loss above 2^53"
)]
const fn to_f64(value: u64) -> f64 {
    value as f64
}
