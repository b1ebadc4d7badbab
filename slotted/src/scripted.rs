//! Data-driven places, activities, and controller.
//!
//! A [`Catalog`] describes every place of an application as plain data
//! ([`PlaceSpec`]). Places built from it run [`ScriptedActivity`]s that record
//! each lifecycle hook in a shared [`Journal`]. The scenario harness and the
//! tests drive real [`SlotTree`](crate::core::SlotTree)s with these.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::core::{
    Activity, ActivityContext, Event, EventScope, GuardedViewTarget, LegacyActivityMapper, Place,
    PlaceId, PlaceParameters, PlaceRef, Slot, TreeController, View, ViewTarget,
};

/// Topic every scripted activity listens on while it runs.
pub const PING_TOPIC: &str = "ping";

/// Ordered record of lifecycle hooks and display updates.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// Drain all entries recorded so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

/// Slot a place is shown in: the owning place and the slot's default place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotSpec {
    pub owner: String,
    pub default: String,
}

/// Where a place's activity comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivitySource {
    /// The place builds it.
    #[default]
    Place,
    /// The controller's legacy mapper builds it.
    Legacy,
    /// Nobody does; starting this place is a configuration error.
    Missing,
}

/// Scripted behavior of a place's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivitySpec {
    pub source: ActivitySource,
    /// Supply the view only when the harness delivers it.
    pub deferred: bool,
    /// Report loading at start; cleared by the harness.
    pub loading: bool,
    /// Returned from `may_stop`.
    pub warning: Option<String>,
    /// View label; defaults to the place id.
    pub view: Option<String>,
    /// Overrides whether the activity hosts child slots. Defaults to whether
    /// the place declares any.
    pub hosts_children: Option<bool>,
    /// Hand out displays for child slots.
    pub child_displays: bool,
}

impl Default for ActivitySpec {
    fn default() -> Self {
        Self {
            source: ActivitySource::Place,
            deferred: false,
            loading: false,
            warning: None,
            view: None,
            hosts_children: None,
            child_displays: true,
        }
    }
}

/// One place of the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceSpec {
    /// `None` marks a root place.
    pub slot: Option<SlotSpec>,
    /// Default place ids of the slots this place hosts.
    pub children: Vec<String>,
    pub activity: ActivitySpec,
    /// Parameters contributed during reconcile.
    pub params: BTreeMap<String, String>,
}

struct CatalogInner {
    root: PlaceId,
    specs: BTreeMap<PlaceId, PlaceSpec>,
    journal: Journal,
    started: RefCell<BTreeMap<PlaceId, GuardedViewTarget>>,
}

/// Shared place catalog.
#[derive(Clone)]
pub struct Catalog(Rc<CatalogInner>);

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("root", &self.0.root)
            .field("places", &self.0.specs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Catalog {
    pub fn new(root: impl Into<PlaceId>, specs: BTreeMap<PlaceId, PlaceSpec>) -> Self {
        Self(Rc::new(CatalogInner {
            root: root.into(),
            specs,
            journal: Journal::default(),
            started: RefCell::new(BTreeMap::new()),
        }))
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn journal(&self) -> &Journal {
        &self.0.journal
    }

    pub fn root_id(&self) -> &PlaceId {
        &self.0.root
    }

    pub fn spec(&self, id: &PlaceId) -> Option<&PlaceSpec> {
        self.0.specs.get(id)
    }

    pub fn contains(&self, id: &PlaceId) -> bool {
        self.0.specs.contains_key(id)
    }

    pub fn place(&self, id: impl Into<PlaceId>) -> PlaceRef {
        Rc::new(ScriptedPlace {
            id: id.into(),
            catalog: self.clone(),
        })
    }

    pub fn places(&self, ids: &[&str]) -> Vec<PlaceRef> {
        ids.iter().map(|id| self.place(*id)).collect()
    }

    pub fn root_slot(&self) -> Slot {
        Slot::root(self.place(self.0.root.clone()))
    }

    /// The slot `id` is shown in; the root slot for root places.
    pub fn slot_of(&self, id: impl Into<PlaceId>) -> Slot {
        self.place(id).owning_slot().unwrap_or_else(|| self.root_slot())
    }

    pub fn root_display(&self) -> Rc<RecordingDisplay> {
        Rc::new(RecordingDisplay::new("root", self.journal().clone()))
    }

    /// Most recent guarded target handed to an activity of `id`.
    pub fn latest_target(&self, id: &PlaceId) -> Option<GuardedViewTarget> {
        self.0.started.borrow().get(id).cloned()
    }

    /// Number of places whose latest target is remembered.
    pub fn tracked_targets(&self) -> usize {
        self.0.started.borrow().len()
    }

    /// Supply the view of the most recently started activity of `id`.
    /// Returns `false` if none was started or it has since been stopped.
    pub fn deliver(&self, id: &PlaceId) -> bool {
        let Some(target) = self.latest_target(id) else {
            return false;
        };
        let live = target.is_live();
        target.set_view(&self.view_for(id));
        live
    }

    pub fn view_for(&self, id: &PlaceId) -> View {
        let label = self
            .spec(id)
            .and_then(|spec| spec.activity.view.clone())
            .unwrap_or_else(|| id.to_string());
        View::new(label)
    }

    fn record_start(&self, id: &PlaceId, target: GuardedViewTarget) {
        self.0.started.borrow_mut().insert(id.clone(), target);
    }

    fn build_activity(&self, id: &PlaceId) -> Option<Box<dyn Activity>> {
        let spec = self.spec(id)?;
        Some(Box::new(ScriptedActivity {
            place: id.clone(),
            spec: spec.activity.clone(),
            declared_children: spec.children.len(),
            catalog: self.clone(),
            ctx: None,
        }))
    }
}

/// Builder used to assemble catalogs in code.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    root: Option<PlaceId>,
    specs: BTreeMap<PlaceId, PlaceSpec>,
}

impl CatalogBuilder {
    /// Add a root place. The first root added is the root slot's default.
    pub fn root(mut self, id: &str, children: &[&str]) -> Self {
        self.root.get_or_insert_with(|| PlaceId::from(id));
        self.specs.insert(
            id.into(),
            PlaceSpec {
                children: children.iter().map(|c| c.to_string()).collect(),
                ..PlaceSpec::default()
            },
        );
        self
    }

    /// Add a place shown in the slot owned by `owner` whose default is `default`.
    pub fn child(mut self, id: &str, owner: &str, default: &str, children: &[&str]) -> Self {
        self.specs.insert(
            id.into(),
            PlaceSpec {
                slot: Some(SlotSpec {
                    owner: owner.to_string(),
                    default: default.to_string(),
                }),
                children: children.iter().map(|c| c.to_string()).collect(),
                ..PlaceSpec::default()
            },
        );
        self
    }

    /// Adjust the activity behavior of an already added place.
    pub fn activity(mut self, id: &str, configure: impl FnOnce(&mut ActivitySpec)) -> Self {
        if let Some(spec) = self.specs.get_mut(&PlaceId::from(id)) {
            configure(&mut spec.activity);
        }
        self
    }

    pub fn param(mut self, id: &str, key: &str, value: &str) -> Self {
        if let Some(spec) = self.specs.get_mut(&PlaceId::from(id)) {
            spec.params.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn build(self) -> Catalog {
        let root = self.root.unwrap_or_else(|| PlaceId::from("root"));
        Catalog::new(root, self.specs)
    }
}

/// A place backed by a catalog entry.
pub struct ScriptedPlace {
    id: PlaceId,
    catalog: Catalog,
}

impl fmt::Debug for ScriptedPlace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptedPlace({})", self.id)
    }
}

impl Place for ScriptedPlace {
    fn id(&self) -> PlaceId {
        self.id.clone()
    }

    fn owning_slot(&self) -> Option<Slot> {
        let slot = self.catalog.spec(&self.id)?.slot.as_ref()?;
        Some(Slot::new(
            Some(PlaceId::from(slot.owner.as_str())),
            self.catalog.place(slot.default.as_str()),
        ))
    }

    fn child_slots(&self) -> Vec<Slot> {
        let Some(spec) = self.catalog.spec(&self.id) else {
            return Vec::new();
        };
        spec.children
            .iter()
            .map(|default| Slot::new(Some(self.id.clone()), self.catalog.place(default.as_str())))
            .collect()
    }

    fn create_activity(&self) -> Option<Box<dyn Activity>> {
        match self.catalog.spec(&self.id)?.activity.source {
            ActivitySource::Place => self.catalog.build_activity(&self.id),
            ActivitySource::Legacy | ActivitySource::Missing => None,
        }
    }
}

/// Activity that journals every hook and follows its [`ActivitySpec`].
pub struct ScriptedActivity {
    place: PlaceId,
    spec: ActivitySpec,
    declared_children: usize,
    catalog: Catalog,
    ctx: Option<ActivityContext>,
}

impl ScriptedActivity {
    fn log(&self, hook: &str) {
        self.catalog.journal().push(format!("{hook} {}", self.place));
    }
}

impl Activity for ScriptedActivity {
    fn init(&mut self, ctx: ActivityContext) {
        self.ctx = Some(ctx);
    }

    fn may_stop(&mut self) -> Option<String> {
        self.log("may-stop");
        self.spec.warning.clone()
    }

    fn start(&mut self, target: GuardedViewTarget) {
        self.log("start");
        if let Some(ctx) = &self.ctx {
            let journal = self.catalog.journal().clone();
            let place = self.place.clone();
            ctx.events.add_handler(PING_TOPIC, move |event: &Event| {
                journal.push(format!("{} {place}", event.topic));
            });
            if self.spec.loading {
                ctx.slot.set_loading(true);
            }
        }
        self.catalog.record_start(&self.place, target.clone());
        if !self.spec.deferred {
            target.set_view(&self.catalog.view_for(&self.place));
        }
    }

    fn on_stop(&mut self) {
        self.log("stop");
    }

    fn on_cancel(&mut self) {
        self.log("cancel");
    }

    fn on_refresh(&mut self) {
        self.log("refresh");
    }

    fn on_load_complete(&mut self) {
        self.log("load-complete");
    }

    fn hosts_children(&self) -> bool {
        self.spec
            .hosts_children
            .unwrap_or(self.declared_children > 0)
    }

    fn child_slot_display(&mut self, slot: &Slot) -> Option<Rc<dyn ViewTarget>> {
        if !self.spec.child_displays {
            return None;
        }
        let display = RecordingDisplay::new(slot.to_string(), self.catalog.journal().clone());
        Some(Rc::new(display))
    }
}

/// Display that journals every view it is given.
pub struct RecordingDisplay {
    name: String,
    journal: Journal,
    current: RefCell<Option<View>>,
}

impl RecordingDisplay {
    pub fn new(name: impl Into<String>, journal: Journal) -> Self {
        Self {
            name: name.into(),
            journal,
            current: RefCell::new(None),
        }
    }

    pub fn current(&self) -> Option<View> {
        self.current.borrow().clone()
    }
}

impl ViewTarget for RecordingDisplay {
    fn set_view(&self, view: &View) {
        self.journal.push(format!("show {}: {}", self.name, view));
        *self.current.borrow_mut() = Some(view.clone());
    }
}

/// Legacy mapper serving catalog places whose source is `legacy`.
pub struct CatalogMapper {
    catalog: Catalog,
}

impl LegacyActivityMapper for CatalogMapper {
    fn activity_for(&self, place: &dyn Place) -> Option<Box<dyn Activity>> {
        let id = place.id();
        match self.catalog.spec(&id)?.activity.source {
            ActivitySource::Legacy => self.catalog.build_activity(&id),
            ActivitySource::Place | ActivitySource::Missing => None,
        }
    }
}

/// Controller with switchable start policy that counts loading signals.
pub struct ScriptedController {
    catalog: Catalog,
    mapper: Option<CatalogMapper>,
    start_activities: Cell<bool>,
    loading_signals: Cell<u32>,
    ready_signals: Cell<u32>,
}

impl ScriptedController {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            catalog: catalog.clone(),
            mapper: Some(CatalogMapper {
                catalog: catalog.clone(),
            }),
            start_activities: Cell::new(true),
            loading_signals: Cell::new(0),
            ready_signals: Cell::new(0),
        }
    }

    pub fn without_legacy_mapper(mut self) -> Self {
        self.mapper = None;
        self
    }

    pub fn set_start_activities(&self, start: bool) {
        self.start_activities.set(start);
    }

    /// Number of `show_loading` notifications received.
    pub fn loading_signals(&self) -> u32 {
        self.loading_signals.get()
    }

    /// Number of `attempt_show_views` notifications received.
    pub fn ready_signals(&self) -> u32 {
        self.ready_signals.get()
    }

    /// Fire a ping through the bus; returns how many activities heard it.
    pub fn ping(&self, scope: &EventScope) -> usize {
        scope.fire(&Event::new(PING_TOPIC, json!({ "root": self.catalog.root_id() })))
    }
}

impl TreeController for ScriptedController {
    fn should_start_activity(&self) -> bool {
        self.start_activities.get()
    }

    fn show_loading(&self) {
        self.loading_signals.set(self.loading_signals.get() + 1);
    }

    fn attempt_show_views(&self) {
        self.ready_signals.set(self.ready_signals.get() + 1);
    }

    fn legacy_mapper(&self) -> Option<&dyn LegacyActivityMapper> {
        self.mapper
            .as_ref()
            .map(|mapper| mapper as &dyn LegacyActivityMapper)
    }

    fn extract_parameters(&self, place: &dyn Place, params: &mut PlaceParameters) {
        let Some(spec) = self.catalog.spec(&place.id()) else {
            return;
        };
        for (key, value) in &spec.params {
            debug!(place = %place.id(), %key, %value, "extracting parameter");
            params.set(key.clone(), value.clone());
        }
    }
}
