// ============================================================================
// Domain Layer - Customer Profile Mutations
// ============================================================================
//
// One service per entity (customer, tag, note). Every mutating operation
// commits its own database write first, then emits exactly one event per
// logical change through the guarded publish path. The HTTP-facing result
// reflects only the database mutation; publish outcomes are logged here and
// go no further.
//
// ============================================================================

pub mod customer;
pub mod note;
pub mod tag;

pub use customer::{Customer, CustomerService, CustomerUpdate, NewCustomer};
pub use note::{Note, NoteService};
pub use tag::{NewTags, Tag, TagService};

/// Routing keys for the events the domain services emit.
pub const CUSTOMER_CREATED: &str = "v1.customer.created";
pub const CUSTOMER_UPDATED: &str = "v1.customer.updated";
pub const CUSTOMER_TAGGED: &str = "v1.customer.tagged";
pub const CUSTOMER_NOTE_ADDED: &str = "v1.customer.note_added";

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Customer already exists")]
    CustomerExists,

    #[error("Duplicate labels provided")]
    DuplicateLabels,

    #[error("Tag(s) already exist: {0}")]
    TagsExist(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
