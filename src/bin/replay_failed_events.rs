//! Standalone replay pass over the failed-event list.
//!
//! Meant to run from cron or by hand. Takes no arguments; configuration
//! comes from the environment. One invocation drains the list until it is
//! empty or the first resend fails, then exits.

use std::process::ExitCode;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use customer_events::config::Settings;
use customer_events::events::{EventPublisher, RedisFallbackStore, ReplayWorker};
use customer_events::messaging::AmqpTransport;
use customer_events::metrics::Metrics;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,customer_events=debug")),
        )
        .init();

    let settings = Settings::from_env();

    let store = match RedisFallbackStore::new(&settings.redis_url, &settings.failed_events_key) {
        Ok(store) => Arc::new(store),
        Err(error) => {
            tracing::error!(%error, "cannot open fallback store");
            return ExitCode::FAILURE;
        }
    };
    let metrics = match Metrics::new() {
        Ok(metrics) => Arc::new(metrics),
        Err(error) => {
            tracing::error!(%error, "cannot build metrics registry");
            return ExitCode::FAILURE;
        }
    };
    let transport = Arc::new(AmqpTransport::new(
        &settings.rabbitmq_url,
        &settings.rabbitmq_exchange,
        settings.publish_timeout,
    ));
    let publisher = Arc::new(EventPublisher::new(
        transport,
        store.clone(),
        settings.retry_config(),
        metrics.clone(),
    ));

    let worker = ReplayWorker::new(store, publisher, metrics);
    match worker.run_once().await {
        Ok(report) => {
            tracing::info!(
                replayed = report.replayed,
                requeued = report.requeued,
                "replay pass finished"
            );
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(%error, "fallback store unreachable during replay");
            ExitCode::FAILURE
        }
    }
}
