use serde::{Deserialize, Serialize};

use lotstock_core::{EventId, ProductId};

use crate::Event;

/// Envelope for a committed product event, as handed to bus subscribers.
///
/// `sequence_number` is the product version reached once this event was applied,
/// so it increases monotonically per product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: EventId,
    product_id: ProductId,
    event_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: EventId,
        product_id: ProductId,
        event_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            product_id,
            event_type: event_type.into(),
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking product id and type name from the event itself.
    pub fn wrap(sequence_number: u64, payload: E) -> Self {
        Self::new(
            EventId::new(),
            payload.product_id(),
            payload.event_type(),
            sequence_number,
            payload,
        )
    }
}
