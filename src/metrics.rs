// Prometheus metrics definitions for the penguin bot.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// 1 while a creature is out and uncaught.
    pub static ref ACTIVE_SPAWN: IntGauge =
        IntGauge::new("penguin_active_spawn", "Whether a creature is currently catchable").unwrap();

    /// Gateways subscribed to the outbound WebSocket stream.
    pub static ref CONNECTED_GATEWAYS: IntGauge =
        IntGauge::new("penguin_connected_gateways", "Connected gateway WebSockets").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Spawns, by trigger (scheduled, forced).
    pub static ref SPAWNS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("penguin_spawns_total", "Total creatures spawned"),
        &["trigger"],
    )
    .unwrap();

    /// Successful catches, by creature name.
    pub static ref CATCHES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("penguin_catches_total", "Total creatures caught"),
        &["creature"],
    )
    .unwrap();

    /// Catch phrases sent while nothing was out.
    pub static ref MISSED_CATCHES_TOTAL: IntCounter = IntCounter::new(
        "penguin_missed_catches_total",
        "Catch attempts with nothing to catch",
    )
    .unwrap();

    /// Spawns cleared by the expiry policy.
    pub static ref EXPIRED_SPAWNS_TOTAL: IntCounter = IntCounter::new(
        "penguin_expired_spawns_total",
        "Spawns that expired uncaught",
    )
    .unwrap();

    pub static ref INBOUND_MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "penguin_inbound_messages_total",
        "Messages received from the gateway",
    )
    .unwrap();

    pub static ref OUTBOUND_MESSAGES_TOTAL: IntCounter = IntCounter::new(
        "penguin_outbound_messages_total",
        "Messages handed to the gateway",
    )
    .unwrap();

    /// Score file writes that failed.
    pub static ref SCORE_SAVE_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "penguin_score_save_failures_total",
        "Failed score file writes",
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Seconds between a spawn and its catch.
    pub static ref TIME_TO_CATCH_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new("penguin_time_to_catch_seconds", "Seconds from spawn to catch")
            .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0, 3600.0]),
    )
    .unwrap();
}

static REGISTER: Once = Once::new();

/// Register all metrics with the custom registry. Safe to call more than once.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(ACTIVE_SPAWN.clone()),
            Box::new(CONNECTED_GATEWAYS.clone()),
            Box::new(SPAWNS_TOTAL.clone()),
            Box::new(CATCHES_TOTAL.clone()),
            Box::new(MISSED_CATCHES_TOTAL.clone()),
            Box::new(EXPIRED_SPAWNS_TOTAL.clone()),
            Box::new(INBOUND_MESSAGES_TOTAL.clone()),
            Box::new(OUTBOUND_MESSAGES_TOTAL.clone()),
            Box::new(SCORE_SAVE_FAILURES_TOTAL.clone()),
            Box::new(TIME_TO_CATCH_SECONDS.clone()),
        ];

        for c in collectors {
            if let Err(e) = REGISTRY.register(c) {
                tracing::warn!("Failed to register metric: {e}");
            }
        }
    });
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_after_register() {
        register_metrics();
        register_metrics();
        SPAWNS_TOTAL.with_label_values(&["forced"]).inc();
        let output = gather_metrics();
        assert!(output.contains("penguin_spawns_total"));
    }

    #[test]
    fn test_metric_increments() {
        // Shared with concurrently running tests, so only check counters
        // nothing else touches.
        let before = EXPIRED_SPAWNS_TOTAL.get();

        CONNECTED_GATEWAYS.inc();
        CONNECTED_GATEWAYS.dec();

        CATCHES_TOTAL.with_label_values(&["Emperor"]).inc();
        MISSED_CATCHES_TOTAL.inc();
        EXPIRED_SPAWNS_TOTAL.inc();
        assert!(EXPIRED_SPAWNS_TOTAL.get() > before);
        TIME_TO_CATCH_SECONDS.observe(4.2);
    }
}
