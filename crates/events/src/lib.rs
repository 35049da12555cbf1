//! Post-commit notification mechanics: events, envelopes and the bus.
//!
//! Nothing here is part of the ledger's atomic unit. Publishing happens after
//! a transaction is durable, and a failed publish never undoes it.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod topic;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use topic::Topical;
