use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use customer_events::config::Settings;
use customer_events::domain::{
    CustomerService, CustomerUpdate, NewCustomer, NewTags, NoteService, TagService,
};
use customer_events::events::{EventPublisher, RedisFallbackStore};
use customer_events::messaging::AmqpTransport;
use customer_events::metrics::{self, Metrics};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,customer_events=debug")),
        )
        .init();

    let settings = Settings::from_env();
    tracing::info!(
        exchange = %settings.rabbitmq_exchange,
        "starting customer events service"
    );

    // === 1. Database pool ===
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.database_url)
        .await?;

    // === 2. Prometheus metrics + exposition server ===
    let metrics = Arc::new(Metrics::new()?);
    let registry = Arc::new(metrics.registry().clone());
    let metrics_port = settings.metrics_port;
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async move {
            if let Err(error) = metrics::start_metrics_server(registry, metrics_port).await {
                tracing::error!(%error, "metrics server error");
            }
        });
    });

    // === 3. Publish pipeline: broker transport, fallback store, publisher ===
    let transport = Arc::new(AmqpTransport::new(
        &settings.rabbitmq_url,
        &settings.rabbitmq_exchange,
        settings.publish_timeout,
    ));
    let fallback = Arc::new(RedisFallbackStore::new(
        &settings.redis_url,
        &settings.failed_events_key,
    )?);
    let publisher = Arc::new(EventPublisher::new(
        transport,
        fallback,
        settings.retry_config(),
        metrics.clone(),
    ));

    // === 4. Domain services ===
    let customers = CustomerService::new(pool.clone(), publisher.clone());
    let tags = TagService::new(pool.clone(), publisher.clone());
    let notes = NoteService::new(pool.clone(), publisher.clone());

    // === 5. Exercise the commit-then-publish path end to end ===
    let trace_id = uuid::Uuid::new_v4().to_string();

    let customer = customers
        .create_customer(
            NewCustomer {
                user_id: uuid::Uuid::new_v4(),
                business_id: uuid::Uuid::new_v4(),
                full_name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                gender: None,
                avatar_url: None,
            },
            &trace_id,
        )
        .await?;
    tracing::info!(customer_id = %customer.id, "customer created");

    customers
        .update_customer(
            customer.id,
            CustomerUpdate {
                phone: Some("+44 20 7946 0000".to_string()),
                ..Default::default()
            },
            &trace_id,
        )
        .await?;
    tracing::info!(customer_id = %customer.id, "customer updated");

    tags.create_tags(
        NewTags {
            customer_id: customer.id,
            labels: vec!["vip".to_string(), "newsletter".to_string()],
            color: Some("#ffcc00".to_string()),
            priority: 1,
            created_by: None,
        },
        &trace_id,
    )
    .await?;
    tracing::info!(customer_id = %customer.id, "customer tagged");

    notes
        .create_note(customer.id, "Prefers email contact", None, &trace_id)
        .await?;
    tracing::info!(customer_id = %customer.id, "note added");

    tracing::info!("demo complete");
    Ok(())
}
