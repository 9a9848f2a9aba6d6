// ============================================================================
// Customer Events - reliable event delivery for the customer profile service
// ============================================================================
//
// Every customer mutation (create, update, tag, note) emits a durable
// at-least-once notification to a topic exchange. When the broker is down the
// event is parked in a Redis list and redelivered later by a standalone
// replay pass. Publish failures never fail the mutation that triggered them.
//
// ============================================================================

pub mod config;
pub mod domain;
pub mod events;
pub mod messaging;
pub mod metrics;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;
