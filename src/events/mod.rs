pub mod event;
pub mod fallback;
pub mod publisher;
pub mod replay;

pub use event::{Event, FailedEvent};
pub use fallback::{FallbackError, FallbackStore, RedisFallbackStore};
pub use publisher::{BlockingPublisher, EventPublisher, PublishError, PublishOutcome};
pub use replay::{ReplayReport, ReplayWorker};
