use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DomainError, CUSTOMER_TAGGED};
use crate::events::{Event, EventPublisher};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Tag {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub label: String,
    pub color: Option<String>,
    pub priority: i32,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTags {
    pub customer_id: Uuid,
    pub labels: Vec<String>,
    pub color: Option<String>,
    pub priority: i32,
    pub created_by: Option<Uuid>,
}

const TAG_COLUMNS: &str = "id, customer_id, label, color, priority, created_by, created_at";

pub struct TagService {
    pool: PgPool,
    publisher: Arc<EventPublisher>,
}

impl TagService {
    pub fn new(pool: PgPool, publisher: Arc<EventPublisher>) -> Self {
        Self { pool, publisher }
    }

    /// Create one or more tags in a single transaction, then emit one
    /// `v1.customer.tagged` per tag. Labels must be unique within the
    /// request and not already present for the customer.
    pub async fn create_tags(
        &self,
        new_tags: NewTags,
        trace_id: &str,
    ) -> Result<Vec<Tag>, DomainError> {
        let labels = reject_duplicates(&new_tags.labels)?;

        let existing: Vec<String> = sqlx::query_scalar(
            "SELECT label FROM customer_tags WHERE customer_id = $1 AND label = ANY($2)",
        )
        .bind(new_tags.customer_id)
        .bind(&labels)
        .fetch_all(&self.pool)
        .await?;
        if !existing.is_empty() {
            let mut sorted = existing;
            sorted.sort();
            return Err(DomainError::TagsExist(sorted.join(", ")));
        }

        let mut tx = self.pool.begin().await?;
        let mut tags = Vec::with_capacity(labels.len());
        for label in &labels {
            let tag = sqlx::query_as::<_, Tag>(&format!(
                "INSERT INTO customer_tags ({TAG_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, now()) \
                 RETURNING {TAG_COLUMNS}"
            ))
            .bind(Uuid::new_v4())
            .bind(new_tags.customer_id)
            .bind(label)
            .bind(&new_tags.color)
            .bind(new_tags.priority)
            .bind(new_tags.created_by)
            .fetch_one(&mut *tx)
            .await?;
            tags.push(tag);
        }
        tx.commit().await?;

        for tag in &tags {
            tracing::info!(
                customer_id = %tag.customer_id,
                tag_id = %tag.id,
                label = %tag.label,
                trace_id,
                "customer tagged"
            );

            let event = Event::new(
                CUSTOMER_TAGGED,
                json!({
                    "customer_id": tag.customer_id,
                    "tag_id": tag.id,
                    "label": tag.label,
                    "trace_id": trace_id,
                }),
                trace_id,
            );
            let outcome = self.publisher.publish_or_store(&event).await;
            tracing::debug!(event = CUSTOMER_TAGGED, ?outcome, trace_id, "publish outcome");
        }

        Ok(tags)
    }

    pub async fn get_tag(&self, tag_id: Uuid) -> Result<Option<Tag>, DomainError> {
        let tag = sqlx::query_as::<_, Tag>(&format!(
            "SELECT {TAG_COLUMNS} FROM customer_tags WHERE id = $1"
        ))
        .bind(tag_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tag)
    }
}

/// Request-level duplicate check; preserves the caller's label order.
fn reject_duplicates(labels: &[String]) -> Result<Vec<String>, DomainError> {
    let mut seen = std::collections::HashSet::new();
    let unique: Vec<String> = labels
        .iter()
        .filter(|label| seen.insert(label.as_str()))
        .cloned()
        .collect();

    if unique.len() != labels.len() {
        return Err(DomainError::DuplicateLabels);
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_labels_pass_through_in_order() {
        let labels = vec!["vip".to_string(), "newsletter".to_string()];
        let unique = reject_duplicates(&labels).unwrap();
        assert_eq!(unique, labels);
    }

    #[test]
    fn repeated_labels_are_rejected() {
        let labels = vec!["vip".to_string(), "vip".to_string()];
        assert!(matches!(
            reject_duplicates(&labels),
            Err(DomainError::DuplicateLabels)
        ));
    }

    #[test]
    fn empty_request_is_allowed() {
        assert!(reject_duplicates(&[]).unwrap().is_empty());
    }
}
