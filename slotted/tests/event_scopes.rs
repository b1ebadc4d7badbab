//! Event handlers registered by activities never outlive them.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use serde_json::json;

use slotted::core::{
    Activity, ActivityContext, Event, EventBus, GuardedViewTarget, Place, PlaceId,
    PlaceParameters, Slot, SlotTree, TreeController, View, ViewTarget,
};
use slotted::scripted::PING_TOPIC;
use slotted::test_support::{Fixture, three_level};

#[test]
fn each_running_activity_holds_one_handler() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("navigate");
    assert_eq!(fx.bus.handler_count(), 3);

    let root = fx.tree.root();
    let ran = fx.controller.ping(fx.tree.node(root).expect("root").events());
    assert_eq!(ran, 3);
    let pings: Vec<_> = fx
        .journal()
        .into_iter()
        .filter(|line| line.starts_with(PING_TOPIC))
        .collect();
    assert_eq!(pings, vec!["ping R1", "ping M1", "ping L1"]);
}

#[test]
fn stopping_a_subtree_releases_descendant_handlers() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("navigate");
    let mid = fx.node_for("M1").expect("mid");
    assert_eq!(fx.tree.node(mid).expect("mid").events().registered_count(), 2);

    fx.navigate(&["M2"]).expect("navigate");
    assert_eq!(fx.bus.handler_count(), 2);
    assert_eq!(fx.tree.node(mid).expect("mid").events().registered_count(), 1);
}

#[test]
fn refresh_keeps_handlers() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("navigate");
    fx.navigate(&["R1", "M1", "L1"]).expect("again");
    assert_eq!(fx.bus.handler_count(), 3);
}

#[test]
fn swapping_a_leaf_keeps_ancestor_bookkeeping_flat() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("navigate");
    let root = fx.tree.root();
    let mid = fx.node_for("M1").expect("mid");
    assert_eq!(fx.tree.node(root).expect("root").events().registered_count(), 3);

    for round in 0..50 {
        let leaf = if round % 2 == 0 { "L2" } else { "L1" };
        fx.navigate(&[leaf]).expect("swap leaf");
    }
    assert_eq!(fx.tree.node(root).expect("root").events().registered_count(), 3);
    assert_eq!(fx.tree.node(mid).expect("mid").events().registered_count(), 2);
    assert_eq!(fx.bus.handler_count(), 3);
}

#[derive(Debug)]
struct Exploding;

impl Place for Exploding {
    fn id(&self) -> PlaceId {
        PlaceId::from("exploding")
    }

    fn owning_slot(&self) -> Option<Slot> {
        None
    }

    fn create_activity(&self) -> Option<Box<dyn Activity>> {
        Some(Box::new(ExplodingActivity { ctx: None }))
    }
}

struct ExplodingActivity {
    ctx: Option<ActivityContext>,
}

impl Activity for ExplodingActivity {
    fn init(&mut self, ctx: ActivityContext) {
        self.ctx = Some(ctx);
    }

    fn start(&mut self, target: GuardedViewTarget) {
        if let Some(ctx) = &self.ctx {
            ctx.events.add_handler("saved", |_| {});
            ctx.events.add_handler("deleted", |_| {});
        }
        target.set_view(&View::new("boom"));
    }

    fn on_stop(&mut self) {
        panic!("teardown failed");
    }
}

struct Quiet;

impl TreeController for Quiet {}

struct Blank;

impl ViewTarget for Blank {
    fn set_view(&self, _view: &View) {}
}

#[test]
fn scope_is_released_even_when_stop_panics() {
    let place: Rc<dyn Place> = Rc::new(Exploding);
    let bus = EventBus::new();
    let mut tree = SlotTree::new(
        Slot::root(Rc::clone(&place)),
        Rc::new(Blank),
        Rc::new(Quiet),
        bus.clone(),
    );
    let mut params = PlaceParameters::new();
    tree.reconcile(&mut params, &[place], false).expect("reconcile");
    assert_eq!(bus.handler_count(), 2);
    assert_eq!(bus.fire(&Event::new("saved", json!({ "id": 1 }))), 1);

    let root = tree.root();
    let outcome = catch_unwind(AssertUnwindSafe(|| tree.stop_activities(root)));
    assert!(outcome.is_err());
    assert_eq!(bus.handler_count(), 0);
    assert_eq!(bus.fire(&Event::new("saved", json!({ "id": 2 }))), 0);
}
