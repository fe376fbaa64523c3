//! Generic fallback message for unrecognized wire ids.
//!
//! When a frame carries an id that is absent from the active descriptor set
//! and the generic-message capability is enabled, the factory materializes
//! this minimal wrapper instead of failing the create. It carries only the
//! id - no decoded fields - and follows the same ownership rules as any
//! other message value, including in-place allocation.

use std::any::Any;

use crate::message::{Message, MsgId, ProtocolMessage};

/// Minimal message value wrapping an unrecognized wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericMessage {
    id: MsgId,
}

impl GenericMessage {
    /// Wrap a raw wire id.
    pub fn new(id: MsgId) -> Self {
        Self { id }
    }

    /// The wrapped wire id.
    pub fn id(&self) -> MsgId {
        self.id
    }
}

impl Message for GenericMessage {
    fn wire_id(&self) -> MsgId {
        self.id
    }

    fn type_name(&self) -> &'static str {
        Self::NAME
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl ProtocolMessage for GenericMessage {
    // Never registered in a descriptor set; created only through the
    // factory's generic fallback, which bypasses dispatch matching.
    const WIRE_ID: Option<MsgId> = None;
    const NAME: &'static str = "GenericMessage";

    fn current_wire_id() -> MsgId {
        0
    }

    fn from_wire(id: MsgId, _offset: u16) -> Self {
        Self { id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_the_wrapped_id() {
        let msg = GenericMessage::from_wire(99, 0);
        assert_eq!(msg.id(), 99);
        assert_eq!(msg.wire_id(), 99);
        assert_eq!(msg.type_name(), "GenericMessage");
    }

    #[test]
    fn distinct_ids_compare_unequal() {
        assert_ne!(GenericMessage::new(1), GenericMessage::new(2));
        assert_eq!(GenericMessage::new(5), GenericMessage::from_wire(5, 3));
    }
}
