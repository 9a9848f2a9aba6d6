use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DomainError, CUSTOMER_NOTE_ADDED};
use crate::events::{Event, EventPublisher};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Note {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub content: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

const NOTE_COLUMNS: &str = "id, customer_id, content, created_by, created_at";

pub struct NoteService {
    pool: PgPool,
    publisher: Arc<EventPublisher>,
}

impl NoteService {
    pub fn new(pool: PgPool, publisher: Arc<EventPublisher>) -> Self {
        Self { pool, publisher }
    }

    /// Insert a note, then emit `v1.customer.note_added`.
    pub async fn create_note(
        &self,
        customer_id: Uuid,
        content: &str,
        created_by: Option<Uuid>,
        trace_id: &str,
    ) -> Result<Note, DomainError> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "INSERT INTO customer_notes ({NOTE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, now()) \
             RETURNING {NOTE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(customer_id)
        .bind(content)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            customer_id = %note.customer_id,
            note_id = %note.id,
            trace_id,
            "note created"
        );

        let event = Event::new(
            CUSTOMER_NOTE_ADDED,
            json!({
                "customer_id": note.customer_id,
                "note_id": note.id,
                "trace_id": trace_id,
            }),
            trace_id,
        );
        let outcome = self.publisher.publish_or_store(&event).await;
        tracing::debug!(event = CUSTOMER_NOTE_ADDED, ?outcome, trace_id, "publish outcome");

        Ok(note)
    }

    pub async fn get_note(&self, note_id: Uuid) -> Result<Option<Note>, DomainError> {
        let note = sqlx::query_as::<_, Note>(&format!(
            "SELECT {NOTE_COLUMNS} FROM customer_notes WHERE id = $1"
        ))
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(note)
    }
}
