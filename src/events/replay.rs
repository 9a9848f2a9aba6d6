use std::sync::Arc;

use crate::events::event::{Event, FailedEvent};
use crate::events::fallback::{FallbackError, FallbackStore};
use crate::events::publisher::EventPublisher;
use crate::metrics::Metrics;

/// Outcome of a single replay pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events successfully redelivered to the broker.
    pub replayed: usize,
    /// Whether the run stopped early and requeued the item it was holding.
    pub requeued: bool,
}

/// Drains the fallback store out of band and re-attempts delivery.
///
/// Consistency model is pop-then-attempt: LPOP removes the item before the
/// resend, so a crash between the two loses that item, and a crash after the
/// resend but before this process exits can duplicate it. Consumers must be
/// idempotent. The alternative (peek, remove after ack) would need a lock
/// across publishers and workers; the list's atomic pop is preferred.
pub struct ReplayWorker {
    store: Arc<dyn FallbackStore>,
    publisher: Arc<EventPublisher>,
    metrics: Arc<Metrics>,
}

impl ReplayWorker {
    pub fn new(
        store: Arc<dyn FallbackStore>,
        publisher: Arc<EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            publisher,
            metrics,
        }
    }

    /// One bounded pass: pop until the list is empty or the first resend
    /// fails. Resends go through the raw publish path, which never enqueues
    /// to the fallback store, so a failure here cannot feed the list by
    /// itself — the item is pushed back verbatim and the run ends.
    pub async fn run_once(&self) -> Result<ReplayReport, FallbackError> {
        let mut report = ReplayReport::default();

        while let Some(raw) = self.store.pop_failed().await? {
            let event: Event = match serde_json::from_str::<FailedEvent>(&raw) {
                Ok(failed) => failed.into(),
                Err(error) => {
                    tracing::error!(
                        error = %error,
                        "unreadable entry in failed-event list, requeueing"
                    );
                    self.requeue(&raw, &mut report).await;
                    break;
                }
            };

            match self.publisher.publish(&event).await {
                Ok(()) => {
                    report.replayed += 1;
                    self.metrics.replay_resent.inc();
                    tracing::info!(
                        event = %event.name,
                        trace_id = %event.trace_id,
                        "failed event redelivered"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        event = %event.name,
                        trace_id = %event.trace_id,
                        error = %error,
                        "replay failed, stopping this run"
                    );
                    self.requeue(&raw, &mut report).await;
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn requeue(&self, raw: &str, report: &mut ReplayReport) {
        match self.store.push_back(raw).await {
            Ok(()) => {
                report.requeued = true;
                self.metrics.replay_requeued.inc();
            }
            Err(error) => {
                tracing::error!(error = %error, "could not requeue failed event, entry lost");
            }
        }
    }
}
