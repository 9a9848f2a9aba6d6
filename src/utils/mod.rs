pub mod retry;

pub use retry::{retry_with_delay, RetryConfig, RetryResult};
