//! Contracts between the slot tree and the code it drives.
//!
//! - [`Activity`]: view logic bound to a place while it is current.
//! - [`TreeController`]: policy and notifications, injected into the tree.
//! - [`LegacyActivityMapper`]: fallback lookup for places that do not build
//!   their own activity.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::events::EventScope;
use crate::core::place::{Place, PlaceParameters, PlaceRef, Slot};
use crate::core::view::{GuardedViewTarget, SharedGuard, ViewGuard, ViewTarget};

/// Identity of one started activity. Allocated by the tree, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActivityId(u64);

impl ActivityId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// View logic for one place.
///
/// Every activity can host child slots; the default implementation hosts
/// none. An activity whose place declares child slots must return `true` from
/// [`Activity::hosts_children`] and hand out a display per child slot once
/// `start` returns.
pub trait Activity {
    /// Bind to the node's context. Called before `start` and before every
    /// `on_refresh`.
    fn init(&mut self, _ctx: ActivityContext) {}

    /// Warning to show before navigating away, if any.
    fn may_stop(&mut self) -> Option<String> {
        None
    }

    /// Begin producing a view. The view may be supplied now or later.
    fn start(&mut self, target: GuardedViewTarget);

    fn on_stop(&mut self) {}

    /// Called instead of `on_stop` when the activity never finished starting.
    fn on_cancel(&mut self) {}

    fn on_refresh(&mut self) {}

    fn on_load_complete(&mut self) {}

    fn hosts_children(&self) -> bool {
        false
    }

    fn child_slot_display(&mut self, _slot: &Slot) -> Option<Rc<dyn ViewTarget>> {
        None
    }
}

/// Fallback activity lookup for places without their own factory.
pub trait LegacyActivityMapper {
    fn activity_for(&self, place: &dyn Place) -> Option<Box<dyn Activity>>;
}

/// Policy and notifications supplied by the owner of the tree.
pub trait TreeController {
    /// Read once per reconcile. When `false`, places are committed but no
    /// activity is started or refreshed.
    fn should_start_activity(&self) -> bool {
        true
    }

    /// Some slot started loading.
    fn show_loading(&self) {}

    /// Some slot finished loading; the owner should re-check the tree and
    /// reveal if nothing is loading anymore.
    fn attempt_show_views(&self) {}

    fn legacy_mapper(&self) -> Option<&dyn LegacyActivityMapper> {
        None
    }

    /// Contribute this place's parameters to the navigation-wide set.
    fn extract_parameters(&self, _place: &dyn Place, _params: &mut PlaceParameters) {}
}

/// Everything an activity is bound to while it runs in a slot.
#[derive(Clone)]
pub struct ActivityContext {
    pub place: PlaceRef,
    pub parameters: PlaceParameters,
    pub events: EventScope,
    pub slot: SlotHandle,
}

impl fmt::Debug for ActivityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActivityContext")
            .field("place", &self.place.id())
            .field("parameters", &self.parameters)
            .field("activity", &self.slot.activity())
            .finish()
    }
}

/// Activity-side handle for reporting loading state to its slot.
#[derive(Clone)]
pub struct SlotHandle {
    activity: ActivityId,
    guard: Weak<RefCell<ViewGuard>>,
    controller: Rc<dyn TreeController>,
}

impl SlotHandle {
    pub(crate) fn new(
        activity: ActivityId,
        guard: &SharedGuard,
        controller: Rc<dyn TreeController>,
    ) -> Self {
        Self {
            activity,
            guard: Rc::downgrade(guard),
            controller,
        }
    }

    pub fn activity(&self) -> ActivityId {
        self.activity
    }

    /// Report loading state. Ignored (returns `false`) once this activity
    /// no longer owns the slot.
    pub fn set_loading(&self, loading: bool) -> bool {
        match self.guard.upgrade() {
            Some(guard) => apply_loading(&guard, self.activity, loading, self.controller.as_ref()),
            None => {
                debug!(activity = %self.activity, loading, "ignoring loading from stale activity");
                false
            }
        }
    }
}

/// Set the loading flag if `activity` owns `guard`, then notify the controller.
pub(crate) fn apply_loading(
    guard: &SharedGuard,
    activity: ActivityId,
    loading: bool,
    controller: &dyn TreeController,
) -> bool {
    {
        let mut state = guard.borrow_mut();
        if state.owner() != activity {
            debug!(activity = %activity, owner = %state.owner(), "ignoring loading from non-owner");
            return false;
        }
        state.set_loading(loading);
    }
    if loading {
        controller.show_loading();
    } else {
        controller.attempt_show_views();
    }
    true
}
