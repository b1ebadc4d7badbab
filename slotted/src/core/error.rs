//! Errors raised by the slot tree.
//!
//! Configuration errors mean the surrounding application is wired wrong and
//! are never retried. Stale callbacks from superseded activities are not
//! errors; they are dropped where they arrive.

use thiserror::Error;

use crate::core::place::{PlaceId, Slot};
use crate::core::tree::NodeId;

#[derive(Debug, Error)]
pub enum SlotError {
    #[error("place '{0}' built no activity and no legacy activity mapper is configured")]
    NoActivity(PlaceId),

    #[error("place '{0}' built no activity and the legacy activity mapper returned none")]
    MapperReturnedNone(PlaceId),

    #[error("activity for place '{place}' did not provide a display for slot {slot}")]
    MissingChildDisplay { place: PlaceId, slot: String },

    #[error("place '{place}' declares {children} child slot(s) but its activity does not host children")]
    NotComposite { place: PlaceId, children: usize },

    #[error("attempted to reveal views while slot for place {} is loading", .0.as_ref().map_or("<none>", |p| p.as_str()))]
    RevealWhileLoading(Option<PlaceId>),

    #[error("slot node {0} is not part of the tree")]
    UnknownNode(NodeId),
}

impl SlotError {
    pub(crate) fn missing_child_display(place: PlaceId, slot: &Slot) -> Self {
        SlotError::MissingChildDisplay {
            place,
            slot: slot.to_string(),
        }
    }

    /// True for errors caused by application wiring rather than call order.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SlotError::NoActivity(_)
                | SlotError::MapperReturnedNone(_)
                | SlotError::MissingChildDisplay { .. }
                | SlotError::NotComposite { .. }
        )
    }
}
