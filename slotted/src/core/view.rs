//! Views, display targets, and the guarded target handed to starting activities.
//!
//! The node keeps the only strong reference to a [`ViewGuard`]. The
//! [`GuardedViewTarget`] given to an activity holds a weak reference, so once
//! the node stops that activity or starts another one, late views from the old
//! activity have nowhere to land and are dropped.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::activity::ActivityId;

/// Opaque content produced by an activity for its slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct View(String);

impl View {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn label(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Something that can display one view at a time.
pub trait ViewTarget {
    fn set_view(&self, view: &View);
}

/// Display phase of the activity currently bound to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewPhase {
    /// No activity bound.
    Idle,
    /// Start was called; waiting for the activity to supply a view.
    Starting,
    /// A view was supplied and is held until reveal.
    Ready,
    /// Reveal happened; views supplied from now on render immediately.
    Revealed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    Start,
    ViewSupplied,
    Reveal,
    Discard,
}

impl ViewPhase {
    /// Transition table for the display phase. Loading is tracked separately
    /// and never holds a slot in `Starting`.
    pub fn next(self, event: ViewEvent) -> ViewPhase {
        match (self, event) {
            (_, ViewEvent::Discard) => ViewPhase::Idle,
            (_, ViewEvent::Start) => ViewPhase::Starting,
            (ViewPhase::Idle, _) => ViewPhase::Idle,
            (ViewPhase::Starting | ViewPhase::Ready, ViewEvent::ViewSupplied) => ViewPhase::Ready,
            (ViewPhase::Revealed, ViewEvent::ViewSupplied) => ViewPhase::Revealed,
            (_, ViewEvent::Reveal) => ViewPhase::Revealed,
        }
    }
}

/// Per-activity display state owned by a slot node.
pub(crate) struct ViewGuard {
    owner: ActivityId,
    phase: ViewPhase,
    loading: bool,
    view: Option<View>,
    display: Option<Rc<dyn ViewTarget>>,
}

pub(crate) type SharedGuard = Rc<RefCell<ViewGuard>>;

impl ViewGuard {
    pub(crate) fn install(owner: ActivityId, display: Option<Rc<dyn ViewTarget>>) -> SharedGuard {
        Rc::new(RefCell::new(Self {
            owner,
            phase: ViewPhase::Idle.next(ViewEvent::Start),
            loading: false,
            view: None,
            display,
        }))
    }

    pub(crate) fn owner(&self) -> ActivityId {
        self.owner
    }

    pub(crate) fn phase(&self) -> ViewPhase {
        self.phase
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.loading
    }

    pub(crate) fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }

    /// Still waiting on the activity to supply its first view, whether or
    /// not the slot has been revealed.
    pub(crate) fn is_starting(&self) -> bool {
        match self.phase {
            ViewPhase::Starting => true,
            ViewPhase::Revealed => self.view.is_none(),
            ViewPhase::Idle | ViewPhase::Ready => false,
        }
    }

    pub(crate) fn set_display(&mut self, display: Rc<dyn ViewTarget>) {
        self.display = Some(display);
    }

    /// Store a view; returns what to render now if the slot was already revealed.
    fn supply(&mut self, view: View) -> Option<(Rc<dyn ViewTarget>, View)> {
        self.phase = self.phase.next(ViewEvent::ViewSupplied);
        self.view = Some(view);
        self.renderable()
    }

    /// Mark revealed; returns the held view and the display to render it on.
    pub(crate) fn reveal(&mut self) -> Option<(Rc<dyn ViewTarget>, View)> {
        self.phase = self.phase.next(ViewEvent::Reveal);
        self.renderable()
    }

    fn renderable(&self) -> Option<(Rc<dyn ViewTarget>, View)> {
        if self.phase != ViewPhase::Revealed {
            return None;
        }
        let view = self.view.clone()?;
        match &self.display {
            Some(display) => Some((Rc::clone(display), view)),
            None => {
                debug!(activity = %self.owner, "revealed slot has no display yet");
                None
            }
        }
    }
}

/// Display handle given to an activity's `start`.
#[derive(Clone)]
pub struct GuardedViewTarget {
    owner: ActivityId,
    guard: Weak<RefCell<ViewGuard>>,
}

impl fmt::Debug for GuardedViewTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedViewTarget")
            .field("owner", &self.owner)
            .field("live", &self.is_live())
            .finish()
    }
}

impl GuardedViewTarget {
    pub(crate) fn new(guard: &SharedGuard) -> Self {
        Self {
            owner: guard.borrow().owner(),
            guard: Rc::downgrade(guard),
        }
    }

    pub fn owner(&self) -> ActivityId {
        self.owner
    }

    /// False once the owning activity has been stopped or superseded.
    pub fn is_live(&self) -> bool {
        self.guard.strong_count() > 0
    }
}

impl ViewTarget for GuardedViewTarget {
    fn set_view(&self, view: &View) {
        let Some(guard) = self.guard.upgrade() else {
            debug!(activity = %self.owner, view = %view, "dropping view from stale activity");
            return;
        };
        let render = guard.borrow_mut().supply(view.clone());
        if let Some((display, view)) = render {
            display.set_view(&view);
        }
    }
}
