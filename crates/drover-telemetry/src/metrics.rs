//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Gauges take `usize` counts and saturate, so callers never cast.

use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by the watcher loop and the status surface.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    descriptor_events_total: IntCounterVec,
    session_operations_total: IntCounterVec,
    active_sessions: IntGauge,
    pending_fetch_tasks: IntGauge,
}

/// Snapshot of the gauges for health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Sessions currently admitted by the engine.
    pub active_sessions: i64,
    /// Trigger tasks still waiting on metadata or fetching.
    pub pending_fetch_tasks: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let descriptor_events_total = counter_vec(
            "descriptor_events_total",
            "Descriptor events observed in the watched directory by kind",
            &["kind"],
        )?;
        let session_operations_total = counter_vec(
            "session_operations_total",
            "Engine session operations by outcome",
            &["operation", "outcome"],
        )?;
        let active_sessions = gauge("active_sessions", "Sessions currently held by the engine")?;
        let pending_fetch_tasks = gauge(
            "pending_fetch_tasks",
            "Fetch triggers waiting on metadata or in progress",
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "descriptor_events_total", &descriptor_events_total)?;
        register(&registry, "session_operations_total", &session_operations_total)?;
        register(&registry, "active_sessions", &active_sessions)?;
        register(&registry, "pending_fetch_tasks", &pending_fetch_tasks)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                descriptor_events_total,
                session_operations_total,
                active_sessions,
                pending_fetch_tasks,
            }),
        })
    }

    /// Increment the HTTP request counter for the given route and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Increment the descriptor event counter (`added` or `removed`).
    pub fn inc_descriptor_event(&self, kind: &str) {
        self.inner
            .descriptor_events_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Increment the session operation counter, e.g. `("add", "ok")` or `("fetch", "abandoned")`.
    pub fn inc_session_operation(&self, operation: &str, outcome: &str) {
        self.inner
            .session_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Set the active session gauge.
    pub fn set_active_sessions(&self, count: usize) {
        self.inner.active_sessions.set(saturating_i64(count));
    }

    /// Set the pending fetch task gauge.
    pub fn set_pending_fetch_tasks(&self, count: usize) {
        self.inner.pending_fetch_tasks.set(saturating_i64(count));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the gauges.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            active_sessions: self.inner.active_sessions.get(),
            pending_fetch_tasks: self.inner.pending_fetch_tasks.get(),
        }
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

fn saturating_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
