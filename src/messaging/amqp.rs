use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::{AMQPValue, FieldTable},
    BasicProperties, Connection, ConnectionProperties, ExchangeKind,
};

use crate::events::Event;

/// Delivery seam between the publisher and the broker. One call delivers one
/// event or fails; retry and fallback live above this trait.
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    async fn send(&self, event: &Event) -> Result<()>;
}

/// AMQP transport: fresh connection per call, durable topic exchange,
/// routing key = event name, `trace_id` message header.
///
/// No connection pooling. Opening and closing per publish costs a round trip
/// but keeps concurrent requests fully independent of each other.
pub struct AmqpTransport {
    url: String,
    exchange: String,
    timeout: Duration,
}

impl AmqpTransport {
    pub fn new(url: &str, exchange: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            exchange: exchange.to_string(),
            timeout,
        }
    }

    async fn deliver(&self, event: &Event) -> Result<()> {
        let connection = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .context("broker connect failed")?;

        let result = self.publish_on(&connection, event).await;

        // Close whether or not the publish went through.
        let _ = connection.close(200, "publish done").await;
        result
    }

    async fn publish_on(&self, connection: &Connection, event: &Event) -> Result<()> {
        let channel = connection
            .create_channel()
            .await
            .context("channel open failed")?;

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("exchange declare failed")?;

        let mut headers = FieldTable::default();
        headers.insert(
            "trace_id".into(),
            AMQPValue::LongString(event.trace_id.as_str().into()),
        );
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_headers(headers);

        let body = serde_json::to_vec(&event.payload).context("payload serialization failed")?;

        channel
            .basic_publish(
                &self.exchange,
                &event.name,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .context("publish failed")?
            .await
            .context("broker rejected publish")?;

        Ok(())
    }
}

#[async_trait]
impl BrokerTransport for AmqpTransport {
    async fn send(&self, event: &Event) -> Result<()> {
        // Bounded so a hung broker cannot stall the write path.
        tokio::time::timeout(self.timeout, self.deliver(event))
            .await
            .map_err(|_| anyhow::anyhow!("broker timed out after {:?}", self.timeout))?
    }
}
