// Private module declaration
mod server;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Event publishing (throughput, retries, failures)
// - Fallback store writes and losses
// - Replay pass outcomes
//
// Fallback-list depth plus these counters are the operator's only signal of
// degraded delivery; the write path never surfaces publish failures.
//
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Publishing Metrics
    pub events_published: IntCounterVec,
    pub publish_retries: IntCounterVec,
    pub publish_failures: IntCounterVec,

    // Fallback Store Metrics
    pub events_stored_for_replay: IntCounter,
    pub events_lost: IntCounter,

    // Replay Metrics
    pub replay_resent: IntCounter,
    pub replay_requeued: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Publishing Metrics
        let events_published = IntCounterVec::new(
            Opts::new("events_published_total", "Events accepted by the broker"),
            &["event"],
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let publish_retries = IntCounterVec::new(
            Opts::new("publish_retries_total", "Second publish attempts after a failure"),
            &["event"],
        )?;
        registry.register(Box::new(publish_retries.clone()))?;

        let publish_failures = IntCounterVec::new(
            Opts::new("publish_failures_total", "Publishes that exhausted all attempts"),
            &["event"],
        )?;
        registry.register(Box::new(publish_failures.clone()))?;

        // Fallback Store Metrics
        let events_stored_for_replay = IntCounter::new(
            "events_stored_for_replay_total",
            "Events parked in the fallback store",
        )?;
        registry.register(Box::new(events_stored_for_replay.clone()))?;

        let events_lost = IntCounter::new(
            "events_lost_total",
            "Events dropped because broker and fallback store were both down",
        )?;
        registry.register(Box::new(events_lost.clone()))?;

        // Replay Metrics
        let replay_resent = IntCounter::new(
            "replay_resent_total",
            "Parked events redelivered by a replay pass",
        )?;
        registry.register(Box::new(replay_resent.clone()))?;

        let replay_requeued = IntCounter::new(
            "replay_requeued_total",
            "Parked events pushed back after a failed replay",
        )?;
        registry.register(Box::new(replay_requeued.clone()))?;

        Ok(Self {
            registry,
            events_published,
            publish_retries,
            publish_failures,
            events_stored_for_replay,
            events_lost,
            replay_resent,
            replay_requeued,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Encoder;

    #[test]
    fn all_metrics_register_cleanly() {
        let metrics = Metrics::new().unwrap();
        metrics
            .events_published
            .with_label_values(&["v1.customer.created"])
            .inc();
        metrics.events_stored_for_replay.inc();

        let mut buffer = Vec::new();
        prometheus::TextEncoder::new()
            .encode(&metrics.registry().gather(), &mut buffer)
            .unwrap();
        let exposition = String::from_utf8(buffer).unwrap();
        assert!(exposition.contains("events_published_total"));
        assert!(exposition.contains("events_stored_for_replay_total 1"));
    }
}
