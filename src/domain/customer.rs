use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{DomainError, CUSTOMER_CREATED, CUSTOMER_UPDATED};
use crate::events::{Event, EventPublisher};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
}

/// Partial update; `None` means "leave unchanged".
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub avatar_url: Option<String>,
}

const CUSTOMER_COLUMNS: &str =
    "id, user_id, business_id, full_name, email, phone, gender, avatar_url, created_at, updated_at";

pub struct CustomerService {
    pool: PgPool,
    publisher: Arc<EventPublisher>,
}

impl CustomerService {
    pub fn new(pool: PgPool, publisher: Arc<EventPublisher>) -> Self {
        Self { pool, publisher }
    }

    /// Insert a customer, then emit `v1.customer.created`. The insert is the
    /// commit point; the event goes out only after it succeeds and cannot
    /// fail the call.
    pub async fn create_customer(
        &self,
        customer: NewCustomer,
        trace_id: &str,
    ) -> Result<Customer, DomainError> {
        let inserted = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers ({CUSTOMER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now()) \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(customer.user_id)
        .bind(customer.business_id)
        .bind(&customer.full_name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.gender)
        .bind(&customer.avatar_url)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::CustomerExists,
            _ => DomainError::Database(error),
        })?;

        tracing::info!(
            customer_id = %inserted.id,
            business_id = %inserted.business_id,
            trace_id,
            "customer created"
        );

        let event = Event::new(
            CUSTOMER_CREATED,
            json!({
                "id": inserted.id,
                "user_id": inserted.user_id,
                "business_id": inserted.business_id,
                "trace_id": trace_id,
            }),
            trace_id,
        );
        let outcome = self.publisher.publish_or_store(&event).await;
        tracing::debug!(event = CUSTOMER_CREATED, ?outcome, trace_id, "publish outcome");

        Ok(inserted)
    }

    pub async fn get_customer(&self, customer_id: Uuid) -> Result<Option<Customer>, DomainError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = $1"
        ))
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(customer)
    }

    /// Apply a partial update and emit `v1.customer.updated` carrying the
    /// changed column names. A patch that changes nothing writes nothing and
    /// emits nothing.
    pub async fn update_customer(
        &self,
        customer_id: Uuid,
        update: CustomerUpdate,
        trace_id: &str,
    ) -> Result<Option<Customer>, DomainError> {
        let Some(current) = self.get_customer(customer_id).await? else {
            return Ok(None);
        };

        let (next, fields_changed) = apply_update(&current, &update);
        if fields_changed.is_empty() {
            return Ok(Some(current));
        }

        let updated = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers \
             SET full_name = $2, email = $3, phone = $4, gender = $5, avatar_url = $6, updated_at = now() \
             WHERE id = $1 \
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(customer_id)
        .bind(&next.full_name)
        .bind(&next.email)
        .bind(&next.phone)
        .bind(&next.gender)
        .bind(&next.avatar_url)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            customer_id = %updated.id,
            ?fields_changed,
            trace_id,
            "customer updated"
        );

        let event = Event::new(
            CUSTOMER_UPDATED,
            json!({
                "id": updated.id,
                "fields_changed": fields_changed,
                "trace_id": trace_id,
            }),
            trace_id,
        );
        let outcome = self.publisher.publish_or_store(&event).await;
        tracing::debug!(event = CUSTOMER_UPDATED, ?outcome, trace_id, "publish outcome");

        Ok(Some(updated))
    }

    /// Plain delete; GDPR fan-out across related tables lives elsewhere.
    pub async fn delete_customer(&self, customer_id: Uuid) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(customer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Merge a patch into the current row and name the columns that change.
fn apply_update(current: &Customer, update: &CustomerUpdate) -> (Customer, Vec<String>) {
    let mut next = current.clone();
    let mut fields_changed = Vec::new();

    if let Some(full_name) = &update.full_name {
        if *full_name != next.full_name {
            next.full_name = full_name.clone();
            fields_changed.push("full_name".to_string());
        }
    }
    if let Some(email) = &update.email {
        if *email != next.email {
            next.email = email.clone();
            fields_changed.push("email".to_string());
        }
    }
    if let Some(phone) = &update.phone {
        if next.phone.as_deref() != Some(phone.as_str()) {
            next.phone = Some(phone.clone());
            fields_changed.push("phone".to_string());
        }
    }
    if let Some(gender) = &update.gender {
        if next.gender.as_deref() != Some(gender.as_str()) {
            next.gender = Some(gender.clone());
            fields_changed.push("gender".to_string());
        }
    }
    if let Some(avatar_url) = &update.avatar_url {
        if next.avatar_url.as_deref() != Some(avatar_url.as_str()) {
            next.avatar_url = Some(avatar_url.clone());
            fields_changed.push("avatar_url".to_string());
        }
    }

    (next, fields_changed)
}
