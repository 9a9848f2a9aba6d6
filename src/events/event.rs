use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A domain notification ready for delivery.
///
/// `name` doubles as the routing key (`v1.<entity>.<action>`). The payload
/// carries enough identifying fields for a consumer to act without a
/// follow-up read, and by convention repeats the trace id. Events are built
/// only after the mutation they describe has committed, and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub payload: Value,
    pub trace_id: String,
}

impl Event {
    pub fn new(name: impl Into<String>, payload: Value, trace_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload,
            trace_id: trace_id.into(),
        }
    }
}

/// Wire form of an event parked in the fallback list:
/// `{"event": <name>, "payload": <object>, "trace_id": <string>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedEvent {
    #[serde(rename = "event")]
    pub name: String,
    pub payload: Value,
    pub trace_id: String,
}

impl From<Event> for FailedEvent {
    fn from(event: Event) -> Self {
        Self {
            name: event.name,
            payload: event.payload,
            trace_id: event.trace_id,
        }
    }
}

impl From<FailedEvent> for Event {
    fn from(failed: FailedEvent) -> Self {
        Self {
            name: failed.name,
            payload: failed.payload,
            trace_id: failed.trace_id,
        }
    }
}
