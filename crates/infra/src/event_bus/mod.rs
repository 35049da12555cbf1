//! Notification sinks for committed ledger transactions.
//!
//! The bus abstraction lives in `flowpay-events` as pure mechanics. This
//! module picks a transport at startup: the in-process fan-out bus, or Redis
//! Streams when built with the `redis` feature and `REDIS_URL` is set.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use flowpay_events::{EventBus, EventEnvelope, InMemoryBusError, InMemoryEventBus, Subscription};

#[cfg(feature = "redis")]
pub mod redis_streams;

#[cfg(feature = "redis")]
pub use redis_streams::{RedisStreamsError, RedisStreamsEventBus};

pub type Envelope = EventEnvelope<JsonValue>;

#[derive(Debug, thiserror::Error)]
pub enum NotificationBusError {
    #[error("in-memory bus: {0:?}")]
    InMemory(InMemoryBusError),

    #[cfg(feature = "redis")]
    #[error(transparent)]
    Redis(#[from] RedisStreamsError),
}

/// The notification sink selected at startup.
#[derive(Debug, Clone)]
pub enum NotificationBus {
    InMemory(Arc<InMemoryEventBus<Envelope>>),
    #[cfg(feature = "redis")]
    Redis(Arc<RedisStreamsEventBus>),
}

impl NotificationBus {
    pub fn in_memory() -> Self {
        Self::InMemory(Arc::new(InMemoryEventBus::new()))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InMemory(_) => "in-memory",
            #[cfg(feature = "redis")]
            Self::Redis(_) => "redis-streams",
        }
    }
}

impl EventBus<Envelope> for NotificationBus {
    type Error = NotificationBusError;

    fn publish(&self, message: Envelope) -> Result<(), Self::Error> {
        match self {
            Self::InMemory(bus) => bus.publish(message).map_err(NotificationBusError::InMemory),
            #[cfg(feature = "redis")]
            Self::Redis(bus) => bus.publish(message).map_err(NotificationBusError::from),
        }
    }

    fn subscribe(&self) -> Subscription<Envelope> {
        match self {
            Self::InMemory(bus) => bus.subscribe(),
            #[cfg(feature = "redis")]
            Self::Redis(bus) => bus.subscribe(),
        }
    }
}
