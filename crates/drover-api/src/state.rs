//! Shared handler state.

use std::sync::Arc;

use drover_core::TransferEngine;
use drover_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) engine: Arc<dyn TransferEngine>,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) fn new(engine: Arc<dyn TransferEngine>, telemetry: Metrics) -> Self {
        Self { engine, telemetry }
    }
}
