use std::sync::Arc;

use tokio::runtime::Handle;

use crate::events::event::{Event, FailedEvent};
use crate::events::fallback::FallbackStore;
use crate::messaging::BrokerTransport;
use crate::metrics::Metrics;
use crate::utils::{retry_with_delay, RetryConfig, RetryResult};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("event name is empty")]
    EmptyEventName,

    #[error("broker unavailable after {attempts} attempts: {source}")]
    BrokerUnavailable { attempts: u32, source: anyhow::Error },
}

/// What became of a guarded publish. Callers log it; nothing propagates to
/// the request that triggered the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The broker accepted the message.
    Published,
    /// The broker was down; the event is parked in the fallback store.
    StoredForReplay,
    /// Broker and fallback store both down. The event is gone. Accepted gap:
    /// the write path is never blocked on a double failure.
    Lost,
}

/// Delivers one event to the broker, or guarantees it is not silently
/// dropped. Owns the retry and fallback decision; domain services only see
/// `publish_or_store`.
pub struct EventPublisher {
    transport: Arc<dyn BrokerTransport>,
    fallback: Arc<dyn FallbackStore>,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl EventPublisher {
    pub fn new(
        transport: Arc<dyn BrokerTransport>,
        fallback: Arc<dyn FallbackStore>,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            transport,
            fallback,
            retry,
            metrics,
        }
    }

    /// Low-level publish: sequential attempts with a fixed pause between
    /// them (two attempts total by default). Surfaces `BrokerUnavailable`
    /// on exhaustion and never touches the fallback store — the replay
    /// worker relies on that to avoid feeding the list from itself.
    pub async fn publish(&self, event: &Event) -> Result<(), PublishError> {
        if event.name.is_empty() {
            return Err(PublishError::EmptyEventName);
        }

        let result = retry_with_delay(&self.retry, |attempt| {
            if attempt > 1 {
                self.metrics
                    .publish_retries
                    .with_label_values(&[event.name.as_str()])
                    .inc();
            }
            async move { self.transport.send(event).await }
        })
        .await;

        match result {
            RetryResult::Success(()) => {
                self.metrics
                    .events_published
                    .with_label_values(&[event.name.as_str()])
                    .inc();
                tracing::debug!(
                    event = %event.name,
                    trace_id = %event.trace_id,
                    "event published"
                );
                Ok(())
            }
            RetryResult::Failed(source) => {
                self.metrics
                    .publish_failures
                    .with_label_values(&[event.name.as_str()])
                    .inc();
                Err(PublishError::BrokerUnavailable {
                    attempts: self.retry.max_attempts,
                    source,
                })
            }
        }
    }

    /// Guarded publish for the write path. Never returns an error and never
    /// panics: a broker outage degrades to the fallback store, and a double
    /// outage degrades to a logged loss. The outcome is the only signal.
    pub async fn publish_or_store(&self, event: &Event) -> PublishOutcome {
        match self.publish(event).await {
            Ok(()) => PublishOutcome::Published,
            Err(PublishError::EmptyEventName) => {
                tracing::error!(trace_id = %event.trace_id, "refusing to publish event with empty name");
                PublishOutcome::Lost
            }
            Err(PublishError::BrokerUnavailable { attempts, source }) => {
                tracing::warn!(
                    event = %event.name,
                    trace_id = %event.trace_id,
                    attempts,
                    error = %source,
                    "broker unavailable, parking event for replay"
                );
                let failed = FailedEvent::from(event.clone());
                match self.fallback.store_failed(&failed).await {
                    Ok(()) => {
                        self.metrics.events_stored_for_replay.inc();
                        PublishOutcome::StoredForReplay
                    }
                    Err(store_error) => {
                        // Last line of defense; intentionally no further fallback.
                        self.metrics.events_lost.inc();
                        tracing::error!(
                            event = %event.name,
                            trace_id = %event.trace_id,
                            error = %store_error,
                            "fallback store unavailable, event lost"
                        );
                        PublishOutcome::Lost
                    }
                }
            }
        }
    }
}

/// Adapter for call sites that are not on the event loop. Ships the event
/// across the executor boundary and blocks on the guarded outcome; same
/// never-throws contract as `publish_or_store`.
pub struct BlockingPublisher {
    inner: Arc<EventPublisher>,
    handle: Handle,
}

impl BlockingPublisher {
    pub fn new(inner: Arc<EventPublisher>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    pub fn publish(&self, event: Event) -> PublishOutcome {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = std::sync::mpsc::channel();
        self.handle.spawn(async move {
            let outcome = inner.publish_or_store(&event).await;
            let _ = tx.send(outcome);
        });
        // A torn-down runtime drops the sender; treat that as a loss rather
        // than surfacing anything to the caller.
        rx.recv().unwrap_or(PublishOutcome::Lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryFallbackStore, MockTransport};
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn publisher(
        transport: Arc<MockTransport>,
        store: Arc<MemoryFallbackStore>,
        delay: Duration,
    ) -> EventPublisher {
        EventPublisher::new(
            transport,
            store,
            RetryConfig {
                max_attempts: 2,
                delay,
            },
            Arc::new(Metrics::new().unwrap()),
        )
    }

    fn sample_event() -> Event {
        Event::new(
            "v1.customer.created",
            json!({"id": "42", "trace_id": "trace-1"}),
            "trace-1",
        )
    }

    #[tokio::test]
    async fn first_attempt_success_skips_fallback() {
        let transport = Arc::new(MockTransport::healthy());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport.clone(), store.clone(), Duration::from_millis(10));

        let outcome = publisher.publish_or_store(&sample_event()).await;

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(transport.attempts(), 1);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_second_attempt() {
        let transport = Arc::new(MockTransport::failing(1));
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport.clone(), store.clone(), Duration::from_millis(10));

        let outcome = publisher.publish_or_store(&sample_event()).await;

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(transport.attempts(), 2);
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn broker_down_parks_event_exactly_once() {
        let transport = Arc::new(MockTransport::down());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport.clone(), store.clone(), Duration::from_millis(10));

        let outcome = publisher.publish_or_store(&sample_event()).await;

        assert_eq!(outcome, PublishOutcome::StoredForReplay);
        assert_eq!(transport.attempts(), 2);
        assert_eq!(store.len(), 1);

        let parked: FailedEvent = serde_json::from_str(&store.items()[0]).unwrap();
        assert_eq!(parked.name, "v1.customer.created");
        assert_eq!(parked.trace_id, "trace-1");
        assert_eq!(parked.payload["id"], "42");
    }

    #[tokio::test]
    async fn broker_and_store_down_degrades_to_loss() {
        let transport = Arc::new(MockTransport::down());
        let store = Arc::new(MemoryFallbackStore::broken());
        let publisher = publisher(transport, store, Duration::from_millis(10));

        let outcome = publisher.publish_or_store(&sample_event()).await;

        assert_eq!(outcome, PublishOutcome::Lost);
    }

    #[tokio::test]
    async fn raw_publish_surfaces_broker_unavailable() {
        let transport = Arc::new(MockTransport::down());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport, store.clone(), Duration::from_millis(10));

        let error = publisher.publish(&sample_event()).await.unwrap_err();

        assert!(matches!(
            error,
            PublishError::BrokerUnavailable { attempts: 2, .. }
        ));
        // The raw path never writes to the fallback store.
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn empty_event_name_is_rejected_without_fallback() {
        let transport = Arc::new(MockTransport::healthy());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport.clone(), store.clone(), Duration::from_millis(10));
        let event = Event::new("", json!({}), "trace-1");

        assert!(matches!(
            publisher.publish(&event).await,
            Err(PublishError::EmptyEventName)
        ));
        assert_eq!(publisher.publish_or_store(&event).await, PublishOutcome::Lost);
        assert_eq!(transport.attempts(), 0);
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn two_failed_attempts_span_the_retry_delay() {
        let delay = Duration::from_millis(50);
        let transport = Arc::new(MockTransport::down());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = publisher(transport.clone(), store, delay);

        let started = Instant::now();
        let _ = publisher.publish(&sample_event()).await;

        assert!(started.elapsed() >= delay);
        assert_eq!(transport.attempts(), 2);
    }

    #[test]
    fn blocking_publisher_preserves_the_guarded_contract() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let transport = Arc::new(MockTransport::healthy());
        let store = Arc::new(MemoryFallbackStore::new());
        let publisher = Arc::new(publisher(
            transport.clone(),
            store,
            Duration::from_millis(10),
        ));
        let blocking = BlockingPublisher::new(publisher, rt.handle().clone());

        let outcome = blocking.publish(sample_event());

        assert_eq!(outcome, PublishOutcome::Published);
        assert_eq!(transport.sent().len(), 1);
    }
}
