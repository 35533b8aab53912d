//! Prometheus metrics collection for voxfleet.
//!
//! Exposed on the `/metrics` HTTP endpoint when `server.metrics_port` is set.
//!
//! - `voxfleet_connected_clients` - client connections past `hello`
//! - `voxfleet_live_sessions` - protocol sessions not yet torn down
//! - `voxfleet_session_failures_total{code}` - sessions that ended in `Failed`
//! - `voxfleet_status_broadcasts_total{outcome}` - status changes emitted or suppressed
//! - `voxfleet_port_allocations_total{outcome}` - allocator results
//! - `voxfleet_requests_total{request}` / `voxfleet_request_errors_total{request,code}`
//! - `voxfleet_request_duration_seconds{request}` - request handling latency

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Client connections that completed the handshake.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Protocol sessions not yet torn down.
pub static LIVE_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Sessions that failed, by error code.
pub static SESSION_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Status changes by outcome (`emitted`, `suppressed`, `unroutable`).
pub static STATUS_BROADCASTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Port allocation attempts by outcome.
pub static PORT_ALLOCATIONS: OnceLock<IntCounterVec> = OnceLock::new();

/// Client requests by name.
pub static REQUESTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Client request errors by name and error code.
pub static REQUEST_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Request handling latency by request name.
pub static REQUEST_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Outbound events dropped because a connection's queue was full.
pub static EVENTS_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at startup before any metrics are recorded. Recording
/// before `init` is a silent no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(CONNECTED_CLIENTS, IntGauge::new("voxfleet_connected_clients", "Connected clients"));
    register!(LIVE_SESSIONS, IntGauge::new("voxfleet_live_sessions", "Live protocol sessions"));
    register!(SESSION_FAILURES, IntCounterVec::new(Opts::new("voxfleet_session_failures_total", "Failed protocol sessions by error code"), &["code"]));
    register!(STATUS_BROADCASTS, IntCounterVec::new(Opts::new("voxfleet_status_broadcasts_total", "Status cache changes by outcome"), &["outcome"]));
    register!(PORT_ALLOCATIONS, IntCounterVec::new(Opts::new("voxfleet_port_allocations_total", "Port allocations by outcome"), &["outcome"]));
    register!(REQUESTS, IntCounterVec::new(Opts::new("voxfleet_requests_total", "Client requests by name"), &["request"]));
    register!(REQUEST_ERRORS, IntCounterVec::new(Opts::new("voxfleet_request_errors_total", "Client request errors"), &["request", "code"]));
    register!(REQUEST_LATENCY, HistogramVec::new(
        HistogramOpts::new("voxfleet_request_duration_seconds", "Client request latency by name")
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        &["request"]));
    register!(EVENTS_DROPPED, IntCounter::new("voxfleet_events_dropped_total", "Outbound events dropped on full queues"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions for metric updates
// ============================================================================

fn get_counter_vec(metric: &OnceLock<IntCounterVec>) -> Option<&IntCounterVec> {
    metric.get()
}

fn get_gauge(metric: &OnceLock<IntGauge>) -> Option<&IntGauge> {
    metric.get()
}

#[inline]
pub fn client_connected() {
    if let Some(g) = get_gauge(&CONNECTED_CLIENTS) {
        g.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = get_gauge(&CONNECTED_CLIENTS) {
        g.dec();
    }
}

#[inline]
pub fn session_opened() {
    if let Some(g) = get_gauge(&LIVE_SESSIONS) {
        g.inc();
    }
}

#[inline]
pub fn session_closed() {
    if let Some(g) = get_gauge(&LIVE_SESSIONS) {
        g.dec();
    }
}

#[inline]
pub fn record_session_failure(code: &str) {
    if let Some(c) = get_counter_vec(&SESSION_FAILURES) {
        c.with_label_values(&[code]).inc();
    }
}

#[inline]
pub fn record_status_broadcast(outcome: &str) {
    if let Some(c) = get_counter_vec(&STATUS_BROADCASTS) {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn record_port_allocation(outcome: &str) {
    if let Some(c) = get_counter_vec(&PORT_ALLOCATIONS) {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn record_request(request: &str) {
    if let Some(c) = get_counter_vec(&REQUESTS) {
        c.with_label_values(&[request]).inc();
    }
}

#[inline]
pub fn record_request_error(request: &str, code: &str) {
    if let Some(c) = get_counter_vec(&REQUEST_ERRORS) {
        c.with_label_values(&[request, code]).inc();
    }
}

#[inline]
pub fn record_request_duration(request: &str, duration: f64) {
    if let Some(h) = REQUEST_LATENCY.get() {
        h.with_label_values(&[request]).observe(duration);
    }
}

#[inline]
pub fn record_event_dropped() {
    if let Some(c) = EVENTS_DROPPED.get() {
        c.inc();
    }
}
