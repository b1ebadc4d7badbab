//! Runtime slot tree and its lifecycle passes.
//!
//! Nodes live in an arena keyed by [`NodeId`]; a node owns its children by id
//! and refers to its parent by id only. Ids are never reused, so an id held
//! past a stop simply stops resolving.
//!
//! A navigation runs in up to three passes over the tree:
//!
//! 1. [`SlotTree::may_go_to`] resolves every node's next place and collects
//!    stop warnings, children before parents. Nothing is stopped.
//! 2. [`SlotTree::reconcile`] walks top-down: stops nodes whose place changed,
//!    commits places, rebuilds children, then starts or refreshes activities.
//! 3. [`SlotTree::show_views`] reveals every held view at once, parent first,
//!    once [`SlotTree::first_loading_place`] reports nothing.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::core::activity::{
    Activity, ActivityContext, ActivityId, SlotHandle, TreeController, apply_loading,
};
use crate::core::error::SlotError;
use crate::core::events::{EventBus, EventScope};
use crate::core::place::{Place, PlaceParameters, PlaceRef, Slot, same_place};
use crate::core::resolver::resolve_place;
use crate::core::view::{GuardedViewTarget, SharedGuard, ViewGuard, ViewPhase, ViewTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

struct RunningActivity {
    id: ActivityId,
    activity: Box<dyn Activity>,
}

/// One display region in the runtime tree.
pub struct SlotNode {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    slot: Slot,
    display: Option<Rc<dyn ViewTarget>>,
    place: Option<PlaceRef>,
    pending: Option<PlaceRef>,
    activity: Option<RunningActivity>,
    guard: Option<SharedGuard>,
    events: EventScope,
}

impl SlotNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// Place currently shown in this slot.
    pub fn place(&self) -> Option<&PlaceRef> {
        self.place.as_ref()
    }

    /// Place resolved by the veto pass and not yet committed.
    pub fn pending_place(&self) -> Option<&PlaceRef> {
        self.pending.as_ref()
    }

    pub fn activity_id(&self) -> Option<ActivityId> {
        self.activity.as_ref().map(|running| running.id)
    }

    pub fn phase(&self) -> ViewPhase {
        self.guard
            .as_ref()
            .map_or(ViewPhase::Idle, |guard| guard.borrow().phase())
    }

    /// The activity has not supplied a view yet.
    pub fn is_starting(&self) -> bool {
        self.guard
            .as_ref()
            .is_some_and(|guard| guard.borrow().is_starting())
    }

    pub fn is_loading(&self) -> bool {
        self.guard
            .as_ref()
            .is_some_and(|guard| guard.borrow().is_loading())
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    pub fn events(&self) -> &EventScope {
        &self.events
    }

    fn blocks_reveal(&self) -> bool {
        self.guard
            .as_ref()
            .is_none_or(|guard| guard.borrow().is_loading())
    }

    fn place_changed(&self, next: &PlaceRef) -> bool {
        self.place
            .as_ref()
            .is_none_or(|current| !same_place(current.as_ref(), next.as_ref()))
    }
}

/// Releases a node's event scope when dropped, including during unwinding.
struct ScopeRelease(EventScope);

impl Drop for ScopeRelease {
    fn drop(&mut self) {
        self.0.remove_handlers();
    }
}

/// Inputs shared by every node during one reconcile.
struct Pass<'a> {
    places: &'a [PlaceRef],
    reload_all: bool,
    start_activities: bool,
}

pub struct SlotTree {
    nodes: HashMap<NodeId, SlotNode>,
    root: NodeId,
    next_node: u64,
    next_activity: u64,
    controller: Rc<dyn TreeController>,
}

impl fmt::Debug for SlotTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotTree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl SlotTree {
    /// Create a tree with a single, empty root node shown on `display`.
    pub fn new(
        root_slot: Slot,
        display: Rc<dyn ViewTarget>,
        controller: Rc<dyn TreeController>,
        bus: EventBus,
    ) -> Self {
        let mut tree = Self {
            nodes: HashMap::new(),
            root: NodeId(0),
            next_node: 0,
            next_activity: 0,
            controller,
        };
        tree.root = tree.insert_node(None, root_slot, EventScope::new(bus), Some(display));
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&SlotNode> {
        self.nodes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in depth-first pre-order, starting at the root.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        self.walk_from(self.root, &mut order);
        order
    }

    fn walk_from(&self, id: NodeId, order: &mut Vec<NodeId>) {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };
        order.push(id);
        for child in &node.children {
            self.walk_from(*child, order);
        }
    }

    /// Find the node displaying `slot`.
    pub fn find_slot(&self, slot: &Slot) -> Option<NodeId> {
        self.walk()
            .into_iter()
            .find(|id| self.nodes.get(id).is_some_and(|node| node.slot == *slot))
    }

    /// Veto pass. Resolves every node's next place and returns the warnings
    /// of activities that would be stopped.
    #[instrument(skip_all, fields(places = places.len(), reload_all))]
    pub fn may_go_to(&mut self, places: &[PlaceRef], reload_all: bool) -> Vec<String> {
        let mut warnings = Vec::new();
        self.may_go_to_node(self.root, places, reload_all, &mut warnings);
        debug!(warnings = warnings.len(), "veto pass complete");
        warnings
    }

    fn may_go_to_node(
        &mut self,
        id: NodeId,
        places: &[PlaceRef],
        reload_all: bool,
        warnings: &mut Vec<String>,
    ) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let next = resolve_place(places, &node.slot, node.place.as_ref());
        let mut reload = reload_all;
        let mut check_may_stop = false;
        if reload_all || node.place_changed(&next) {
            check_may_stop = node.activity.is_some();
            reload = true;
        }
        node.pending = Some(next);
        let children = node.children.clone();

        // Children first: their may_stop may rely on the parent still running.
        for child in children {
            self.may_go_to_node(child, places, reload, warnings);
        }

        if !check_may_stop {
            return;
        }
        let Some(running) = self.nodes.get_mut(&id).and_then(|n| n.activity.as_mut()) else {
            return;
        };
        if let Some(warning) = running.activity.may_stop().filter(|w| !w.is_empty()) {
            debug!(node = %id, activity = %running.id, %warning, "activity vetoes stop");
            warnings.push(warning);
        }
    }

    /// Reconcile pass. Stops, starts, and refreshes activities so every node
    /// shows the place resolved for `places`.
    #[instrument(skip_all, fields(places = places.len(), reload_all))]
    pub fn reconcile(
        &mut self,
        params: &mut PlaceParameters,
        places: &[PlaceRef],
        reload_all: bool,
    ) -> Result<(), SlotError> {
        let pass = Pass {
            places,
            reload_all,
            start_activities: self.controller.should_start_activity(),
        };
        self.reconcile_node(self.root, params, &pass)
    }

    fn reconcile_node(
        &mut self,
        id: NodeId,
        params: &mut PlaceParameters,
        pass: &Pass<'_>,
    ) -> Result<(), SlotError> {
        let (next, changed) = {
            let node = self.node_mut(id)?;
            let next = match node.pending.take() {
                Some(pending) => pending,
                None => resolve_place(pass.places, &node.slot, node.place.as_ref()),
            };
            let changed = node.place_changed(&next);
            (next, changed)
        };
        self.controller.extract_parameters(next.as_ref(), params);

        if pass.reload_all || changed {
            self.stop_activities(id);
        }
        self.node_mut(id)?.place = Some(next);
        self.create_children(id)?;

        if pass.start_activities {
            if self.node_mut(id)?.activity.is_none() {
                self.start_activity(id, params)?;
            } else {
                self.refresh_activity(id, params)?;
            }
        }

        let children = self.node_mut(id)?.children.clone();
        for child in children {
            self.reconcile_node(child, params, pass)?;
        }
        Ok(())
    }

    /// Stop this node's activity and its whole subtree. Never fails; the
    /// node's event scope is released even if an activity hook panics.
    pub fn stop_activities(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let _release = ScopeRelease(node.events.clone());
        node.place = None;
        let starting = node.is_starting();
        if let Some(mut running) = node.activity.take() {
            if starting {
                debug!(node = %id, activity = %running.id, "cancelling starting activity");
                running.activity.on_cancel();
            } else {
                debug!(node = %id, activity = %running.id, "stopping activity");
                running.activity.on_stop();
            }
        }
        let children = std::mem::take(&mut node.children);
        for child in children {
            self.stop_activities(child);
            self.nodes.remove(&child);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.guard = None;
        }
    }

    fn create_children(&mut self, id: NodeId) -> Result<(), SlotError> {
        let node = self.node_mut(id)?;
        if !node.children.is_empty() {
            return Ok(());
        }
        let slots = node
            .place
            .as_ref()
            .map(|place| place.child_slots())
            .unwrap_or_default();
        if slots.is_empty() {
            return Ok(());
        }
        let scope = node.events.clone();
        let children: Vec<NodeId> = slots
            .into_iter()
            .map(|slot| self.insert_node(Some(id), slot, scope.child(), None))
            .collect();
        debug!(node = %id, children = children.len(), "created child slots");
        self.node_mut(id)?.children = children;
        Ok(())
    }

    fn start_activity(&mut self, id: NodeId, params: &PlaceParameters) -> Result<(), SlotError> {
        let controller = Rc::clone(&self.controller);
        let (place, events, display) = {
            let node = self.node_mut(id)?;
            let Some(place) = node.place.clone() else {
                return Ok(());
            };
            (place, node.events.clone(), node.display.clone())
        };
        let mut activity = self.build_activity(place.as_ref())?;
        let activity_id = self.alloc_activity_id();
        let guard = ViewGuard::install(activity_id, display);
        activity.init(ActivityContext {
            place: Rc::clone(&place),
            parameters: params.clone(),
            events,
            slot: SlotHandle::new(activity_id, &guard, controller),
        });
        let target = GuardedViewTarget::new(&guard);

        let node = self.node_mut(id)?;
        node.guard = Some(guard);
        let running = node.activity.insert(RunningActivity {
            id: activity_id,
            activity,
        });
        debug!(node = %id, place = %place.id(), activity = %activity_id, "starting activity");
        running.activity.start(target);

        self.wire_child_displays(id, place.as_ref())
    }

    /// Give every child node the display its parent activity assigned to it.
    fn wire_child_displays(&mut self, id: NodeId, place: &dyn Place) -> Result<(), SlotError> {
        let node = self.node_ref(id)?;
        let children: Vec<(NodeId, Slot)> = node
            .children
            .iter()
            .filter_map(|child| self.nodes.get(child).map(|n| (*child, n.slot.clone())))
            .collect();
        let hosts_children = node
            .activity
            .as_ref()
            .is_some_and(|running| running.activity.hosts_children());

        if !hosts_children {
            if children.is_empty() {
                return Ok(());
            }
            return Err(SlotError::NotComposite {
                place: place.id(),
                children: children.len(),
            });
        }

        for (child, slot) in children {
            let display = self
                .node_mut(id)?
                .activity
                .as_mut()
                .and_then(|running| running.activity.child_slot_display(&slot))
                .ok_or_else(|| SlotError::missing_child_display(place.id(), &slot))?;
            let child_node = self.node_mut(child)?;
            if let Some(guard) = &child_node.guard {
                guard.borrow_mut().set_display(Rc::clone(&display));
            }
            child_node.display = Some(display);
        }
        Ok(())
    }

    fn refresh_activity(&mut self, id: NodeId, params: &PlaceParameters) -> Result<(), SlotError> {
        let controller = Rc::clone(&self.controller);
        let node = self.node_mut(id)?;
        let (Some(place), Some(guard)) = (node.place.clone(), node.guard.as_ref()) else {
            warn!(node = %id, "refresh requested for a node without a bound activity");
            return Ok(());
        };
        let events = node.events.clone();
        let Some(running) = node.activity.as_mut() else {
            return Ok(());
        };
        let slot = SlotHandle::new(running.id, guard, controller);
        debug!(node = %id, place = %place.id(), activity = %running.id, "refreshing activity");
        running.activity.init(ActivityContext {
            place,
            parameters: params.clone(),
            events,
            slot,
        });
        running.activity.on_refresh();
        Ok(())
    }

    fn build_activity(&self, place: &dyn Place) -> Result<Box<dyn Activity>, SlotError> {
        if let Some(activity) = place.create_activity() {
            return Ok(activity);
        }
        let mapper = self
            .controller
            .legacy_mapper()
            .ok_or_else(|| SlotError::NoActivity(place.id()))?;
        mapper
            .activity_for(place)
            .ok_or_else(|| SlotError::MapperReturnedNone(place.id()))
    }

    /// Record a loading change reported by `activity`. Ignored unless
    /// `activity` is the one currently bound to `id`.
    pub fn set_loading(&self, id: NodeId, loading: bool, activity: ActivityId) -> bool {
        let Some(guard) = self.nodes.get(&id).and_then(|node| node.guard.as_ref()) else {
            return false;
        };
        apply_loading(guard, activity, loading, self.controller.as_ref())
    }

    /// First node, depth-first, that is not ready to be revealed.
    pub fn first_loading_node(&self) -> Option<NodeId> {
        self.first_loading_from(self.root)
    }

    fn first_loading_from(&self, id: NodeId) -> Option<NodeId> {
        let node = self.nodes.get(&id)?;
        if node.blocks_reveal() {
            return Some(id);
        }
        node.children
            .iter()
            .find_map(|child| self.first_loading_from(*child))
    }

    /// Place of the first node that is not ready to be revealed.
    ///
    /// `None` does not mean the tree is ready: the blocking node may show no
    /// place yet, as a never-navigated root does. Use
    /// [`first_loading_node`](Self::first_loading_node) to test readiness.
    pub fn first_loading_place(&self) -> Option<PlaceRef> {
        self.first_loading_node()
            .and_then(|id| self.nodes.get(&id))
            .and_then(|node| node.place.clone())
    }

    /// Reveal every held view, parent before child. Fails without revealing
    /// anything if any node is still loading.
    #[instrument(skip_all)]
    pub fn show_views(&mut self) -> Result<(), SlotError> {
        if let Some(blocking) = self.first_loading_node() {
            let place = self
                .nodes
                .get(&blocking)
                .and_then(|node| node.place.as_ref())
                .map(|place| place.id());
            warn!(node = %blocking, ?place, "reveal attempted while a slot is loading");
            return Err(SlotError::RevealWhileLoading(place));
        }
        self.show_node(self.root);
        Ok(())
    }

    fn show_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        if let Some(running) = node.activity.as_mut() {
            running.activity.on_load_complete();
        }
        let render = node.guard.as_ref().and_then(|guard| guard.borrow_mut().reveal());
        let children = node.children.clone();
        if let Some((display, view)) = render {
            debug!(node = %id, view = %view, "revealing view");
            display.set_view(&view);
        }
        for child in children {
            self.show_node(child);
        }
    }

    fn insert_node(
        &mut self,
        parent: Option<NodeId>,
        slot: Slot,
        events: EventScope,
        display: Option<Rc<dyn ViewTarget>>,
    ) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            SlotNode {
                parent,
                children: Vec::new(),
                slot,
                display,
                place: None,
                pending: None,
                activity: None,
                guard: None,
                events,
            },
        );
        id
    }

    fn alloc_activity_id(&mut self) -> ActivityId {
        self.next_activity += 1;
        ActivityId::new(self.next_activity)
    }

    fn node_ref(&self, id: NodeId) -> Result<&SlotNode, SlotError> {
        self.nodes.get(&id).ok_or(SlotError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut SlotNode, SlotError> {
        self.nodes.get_mut(&id).ok_or(SlotError::UnknownNode(id))
    }
}
