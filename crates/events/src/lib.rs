//! Domain event plumbing: event metadata, envelopes, and a pub/sub bus.
//!
//! The inventory engine publishes committed product events here; the photo/asset
//! collaborator and any reporting listeners subscribe.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
