//! In-process doubles for the broker and the fallback store.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;

use crate::events::event::{Event, FailedEvent};
use crate::events::fallback::{FallbackError, FallbackStore};
use crate::messaging::BrokerTransport;

/// Broker double: fails the first `failures` sends, records what got through.
pub struct MockTransport {
    failures: AtomicUsize,
    calls: AtomicUsize,
    delivered: Mutex<Vec<Event>>,
}

impl MockTransport {
    pub fn healthy() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Fails every send, forever.
    pub fn down() -> Self {
        Self::failing(usize::MAX)
    }

    pub fn attempts(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<Event> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerTransport for MockTransport {
    async fn send(&self, event: &Event) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.failures.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(anyhow!("connection refused"));
        }

        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fallback store double: a mutex'd queue with a toggle for outage tests.
pub struct MemoryFallbackStore {
    items: Mutex<VecDeque<String>>,
    unavailable: AtomicBool,
}

impl MemoryFallbackStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn broken() -> Self {
        let store = Self::new();
        store.unavailable.store(true, Ordering::SeqCst);
        store
    }

    pub fn seed(&self, raw: impl Into<String>) {
        self.items.lock().unwrap().push_back(raw.into());
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn items(&self) -> Vec<String> {
        self.items.lock().unwrap().iter().cloned().collect()
    }

    fn check_available(&self) -> Result<(), FallbackError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(FallbackError::Unavailable(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "fallback store offline",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl FallbackStore for MemoryFallbackStore {
    async fn store_failed(&self, event: &FailedEvent) -> Result<(), FallbackError> {
        self.check_available()?;
        let raw = serde_json::to_string(event)?;
        self.items.lock().unwrap().push_back(raw);
        Ok(())
    }

    async fn pop_failed(&self) -> Result<Option<String>, FallbackError> {
        self.check_available()?;
        Ok(self.items.lock().unwrap().pop_front())
    }

    async fn push_back(&self, raw: &str) -> Result<(), FallbackError> {
        self.check_available()?;
        self.items.lock().unwrap().push_back(raw.to_string());
        Ok(())
    }
}
