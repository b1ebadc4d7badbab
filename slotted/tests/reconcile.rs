//! Reconcile and veto pass behavior over scripted trees.
//!
//! Tree used by most tests (`three_level`):
//! ```text
//! root slot: R1
//! └── R1>M1: M1 | M2
//!     └── M1>L1: L1 | L2   (only while M1 is shown)
//! ```

use std::collections::HashMap;

use proptest::prelude::*;

use slotted::core::{NodeId, PlaceRef, Slot, resolve_place};
use slotted::test_support::{Fixture, three_level};

#[test]
fn fresh_tree_starts_root_mid_leaf_in_order() {
    let mut fx = Fixture::new(three_level());
    let warnings = fx.navigate(&["R1", "M1", "L1"]).expect("navigate");

    assert!(warnings.is_empty());
    assert_eq!(fx.journal(), vec!["start R1", "start M1", "start L1"]);
    assert_eq!(fx.shown(), vec!["R1", "M1", "L1"]);
}

#[test]
fn changing_the_leaf_refreshes_ancestors_and_restarts_leaf() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("first");
    fx.journal();

    fx.navigate(&["R1", "M1", "L2"]).expect("second");
    assert_eq!(
        fx.journal(),
        vec!["may-stop L1", "refresh R1", "refresh M1", "stop L1", "start L2"]
    );
    assert_eq!(fx.shown(), vec!["R1", "M1", "L2"]);
}

#[test]
fn identical_navigation_only_refreshes() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("first");
    let ids: Vec<_> = fx
        .tree
        .walk()
        .into_iter()
        .map(|id| fx.tree.node(id).and_then(|n| n.activity_id()))
        .collect();
    fx.journal();

    fx.navigate(&["R1", "M1", "L1"]).expect("again");
    assert_eq!(fx.journal(), vec!["refresh R1", "refresh M1", "refresh L1"]);
    let after: Vec<_> = fx
        .tree
        .walk()
        .into_iter()
        .map(|id| fx.tree.node(id).and_then(|n| n.activity_id()))
        .collect();
    assert_eq!(ids, after);
}

#[test]
fn unmatched_slots_keep_their_place() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("first");

    fx.navigate(&["L2"]).expect("leaf only");
    assert_eq!(fx.shown(), vec!["R1", "M1", "L2"]);
}

#[test]
fn empty_navigation_on_fresh_tree_shows_defaults() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&[]).expect("navigate");
    assert_eq!(fx.shown(), vec!["R1", "M1", "L1"]);
}

#[test]
fn replacing_the_mid_place_drops_its_subtree() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("first");
    let leaf = fx.node_for("L1").expect("leaf node");
    fx.journal();

    fx.navigate(&["M2"]).expect("mid");
    assert_eq!(
        fx.journal(),
        vec![
            "may-stop L1",
            "may-stop M1",
            "refresh R1",
            "stop M1",
            "stop L1",
            "start M2"
        ]
    );
    assert_eq!(fx.shown(), vec!["R1", "M2"]);
    assert!(fx.tree.node(leaf).is_none());
    assert_eq!(fx.tree.len(), 2);
}

#[test]
fn veto_collects_children_first_and_changes_nothing() {
    let catalog = slotted::scripted::Catalog::builder()
        .root("R1", &["M1"])
        .child("M1", "R1", "M1", &["L1"])
        .child("M2", "R1", "M1", &[])
        .child("L1", "M1", "L1", &[])
        .activity("M1", |a| a.warning = Some("mid has edits".to_string()))
        .activity("L1", |a| a.warning = Some("leaf has edits".to_string()))
        .build();
    let mut fx = Fixture::new(catalog);
    fx.navigate(&["R1", "M1", "L1"]).expect("first");
    fx.journal();

    let places = fx.catalog.places(&["M2"]);
    let warnings = fx.tree.may_go_to(&places, false);
    assert_eq!(warnings, vec!["leaf has edits", "mid has edits"]);
    assert_eq!(fx.journal(), vec!["may-stop L1", "may-stop M1"]);
    assert_eq!(fx.shown(), vec!["R1", "M1", "L1"]);

    let mid = fx.node_for("M1").expect("mid");
    let pending = fx.tree.node(mid).and_then(|n| n.pending_place().cloned());
    assert_eq!(pending.map(|p| p.id().to_string()), Some("M2".to_string()));
}

#[test]
fn empty_warnings_are_not_reported() {
    let catalog = slotted::scripted::Catalog::builder()
        .root("R1", &[])
        .activity("R1", |a| a.warning = Some(String::new()))
        .build();
    let mut fx = Fixture::new(catalog);
    fx.navigate(&["R1"]).expect("first");

    let places = fx.catalog.places(&["R1"]);
    assert!(fx.tree.may_go_to(&places, true).is_empty());
}

#[test]
fn reload_all_restarts_every_activity() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("first");
    fx.journal();

    let places = fx.catalog.places(&["R1", "M1", "L1"]);
    let warnings = fx.tree.may_go_to(&places, true);
    assert!(warnings.is_empty());
    fx.reconcile(&["R1", "M1", "L1"], true).expect("reload");
    assert_eq!(
        fx.journal(),
        vec![
            "may-stop L1",
            "may-stop M1",
            "may-stop R1",
            "stop R1",
            "stop M1",
            "stop L1",
            "start R1",
            "start M1",
            "start L1"
        ]
    );
}

#[test]
fn policy_off_commits_places_without_activities() {
    let mut fx = Fixture::new(three_level());
    fx.controller.set_start_activities(false);
    fx.navigate(&["R1", "M1", "L2"]).expect("navigate");

    assert!(fx.journal().is_empty());
    assert_eq!(fx.shown(), vec!["R1", "M1", "L2"]);
    assert!(fx.tree.walk().into_iter().all(|id| {
        fx.tree.node(id).is_some_and(|n| n.activity_id().is_none())
    }));
    assert_eq!(fx.tree.first_loading_node(), Some(fx.tree.root()));
    let blocking = fx.tree.first_loading_place().expect("blocking place");
    assert_eq!(blocking.id().as_str(), "R1");
}

#[test]
fn parameters_accumulate_across_the_tree() {
    let catalog = slotted::scripted::Catalog::builder()
        .root("R1", &["M1"])
        .child("M1", "R1", "M1", &["L1"])
        .child("L1", "M1", "L1", &[])
        .child("L2", "M1", "L1", &[])
        .param("R1", "user", "ada")
        .param("L2", "item", "7")
        .build();
    let mut fx = Fixture::new(catalog);
    let params = fx.reconcile(&["L2"], false).expect("reconcile");

    assert_eq!(params.get("user"), Some("ada"));
    assert_eq!(params.get("item"), Some("7"));
    let pairs: Vec<_> = params.iter().collect();
    assert_eq!(pairs, vec![("item", "7"), ("user", "ada")]);
}

#[test]
fn legacy_places_start_through_the_mapper() {
    let catalog = slotted::scripted::Catalog::builder()
        .root("R1", &[])
        .activity("R1", |a| a.source = slotted::scripted::ActivitySource::Legacy)
        .build();
    let mut fx = Fixture::new(catalog);
    fx.navigate(&["R1"]).expect("navigate");
    assert_eq!(fx.journal(), vec!["start R1"]);
}

#[test]
fn find_slot_locates_nodes_by_slot() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L2"]).expect("navigate");

    assert_eq!(fx.tree.find_slot(&fx.catalog.root_slot()), Some(fx.tree.root()));
    assert_eq!(fx.tree.find_slot(&fx.catalog.slot_of("M2")), fx.node_for("M1"));
    assert_eq!(fx.tree.find_slot(&fx.catalog.slot_of("L1")), fx.node_for("L2"));

    let unknown = Slot::new(Some("nowhere".into()), fx.catalog.place("L1"));
    assert_eq!(fx.tree.find_slot(&unknown), None);
}

#[test]
fn child_slots_belong_to_the_parent_place() {
    let mut fx = Fixture::new(three_level());
    fx.navigate(&["R1", "M1", "L1"]).expect("navigate");

    for id in fx.tree.walk() {
        let node = fx.tree.node(id).expect("node");
        let Some(parent) = node.parent() else {
            assert!(node.slot().is_root());
            continue;
        };
        let parent_place = fx
            .tree
            .node(parent)
            .and_then(|p| p.place())
            .map(|p| p.id());
        assert_eq!(node.slot().owner().cloned(), parent_place);
        assert!(fx.tree.node(parent).expect("parent").children().contains(&id));
    }
}

/// Expected place per surviving node, computed before a reconcile from the
/// node's slot and current place.
fn expected_places(fx: &Fixture, places: &[PlaceRef]) -> HashMap<NodeId, String> {
    fx.tree
        .walk()
        .into_iter()
        .filter_map(|id| {
            let node = fx.tree.node(id)?;
            let next = resolve_place(places, node.slot(), node.place());
            Some((id, next.id().to_string()))
        })
        .collect()
}

const POOL: [&str; 5] = ["R1", "M1", "M2", "L1", "L2"];

fn navigation() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..POOL.len(), 0..4)
}

proptest! {
    #[test]
    fn reconcile_commits_the_resolved_place_everywhere(
        navigations in prop::collection::vec(navigation(), 1..8),
        reloads in prop::collection::vec(any::<bool>(), 8),
    ) {
        let mut fx = Fixture::new(three_level());
        for (step, picks) in navigations.iter().enumerate() {
            let ids: Vec<&str> = picks.iter().map(|i| POOL[*i]).collect();
            let places = fx.catalog.places(&ids);
            let reload_all = reloads[step];
            fx.tree.may_go_to(&places, reload_all);
            let expected = expected_places(&fx, &places);
            fx.reconcile(&ids, reload_all).expect("reconcile");

            for id in fx.tree.walk() {
                let node = fx.tree.node(id).expect("node");
                prop_assert!(node.pending_place().is_none());
                let shown = node.place().expect("committed place");
                let want = match expected.get(&id) {
                    Some(want) => want.clone(),
                    None => resolve_place(&places, node.slot(), None).id().to_string(),
                };
                prop_assert_eq!(shown.id().to_string(), want);
                prop_assert!(node.activity_id().is_some());
            }
        }
    }
}
