//! Slot tree lifecycle logic.
//!
//! Core modules are free of I/O. They drive activities through the traits in
//! [`activity`] and are fully testable with scripted implementations.

pub mod activity;
pub mod error;
pub mod events;
pub mod place;
pub mod resolver;
pub mod tree;
pub mod view;

pub use activity::{
    Activity, ActivityContext, ActivityId, LegacyActivityMapper, SlotHandle, TreeController,
};
pub use error::SlotError;
pub use events::{Event, EventBus, EventScope, HandlerId};
pub use place::{Place, PlaceId, PlaceParameters, PlaceRef, Slot};
pub use resolver::resolve_place;
pub use tree::{NodeId, SlotNode, SlotTree};
pub use view::{GuardedViewTarget, View, ViewEvent, ViewPhase, ViewTarget};
