//! Diagnostic dump and rendered summary endpoints.

use std::sync::Arc;

use axum::extract::State;
use drover_core::render_summary;
use drover_telemetry::{current_request_id, current_route};
use tracing::debug;

use crate::state::ApiState;

/// `GET /`: the engine's raw diagnostic dump.
pub(crate) async fn status_dump(State(state): State<Arc<ApiState>>) -> String {
    let dump = state.engine.write_status().await;
    debug!(
        request_id = current_request_id().as_deref().unwrap_or_default(),
        route = current_route().as_deref().unwrap_or_default(),
        bytes = dump.len(),
        "rendering engine dump"
    );
    dump
}

/// `GET /pretty`: one summary line per session, sorted by identifier.
pub(crate) async fn status_summary(State(state): State<Arc<ApiState>>) -> String {
    let snapshots = state.engine.snapshots().await;
    debug!(
        request_id = current_request_id().as_deref().unwrap_or_default(),
        route = current_route().as_deref().unwrap_or_default(),
        sessions = snapshots.len(),
        "rendering status summary"
    );
    render_summary(snapshots)
}
