//! Configuration errors raised while starting activities.

use slotted::core::SlotError;
use slotted::scripted::{ActivitySource, Catalog, ScriptedController};
use slotted::test_support::Fixture;

#[test]
fn place_without_activity_and_no_mapper_fails() {
    let catalog = Catalog::builder()
        .root("home", &[])
        .activity("home", |a| a.source = ActivitySource::Legacy)
        .build();
    let controller = ScriptedController::new(&catalog).without_legacy_mapper();
    let mut fx = Fixture::with_controller(catalog, controller);

    let err = fx.navigate(&["home"]).expect_err("no activity");
    assert!(matches!(&err, SlotError::NoActivity(place) if place.as_str() == "home"));
    assert!(err.is_configuration());
}

#[test]
fn mapper_returning_none_fails() {
    let catalog = Catalog::builder()
        .root("home", &[])
        .activity("home", |a| a.source = ActivitySource::Missing)
        .build();
    let mut fx = Fixture::new(catalog);

    let err = fx.navigate(&["home"]).expect_err("mapper none");
    assert!(matches!(&err, SlotError::MapperReturnedNone(place) if place.as_str() == "home"));
    assert!(err.to_string().contains("legacy activity mapper returned none"));
}

#[test]
fn composite_activity_must_provide_child_displays() {
    let catalog = Catalog::builder()
        .root("home", &["inbox"])
        .child("inbox", "home", "inbox", &[])
        .activity("home", |a| a.child_displays = false)
        .build();
    let mut fx = Fixture::new(catalog);

    let err = fx.navigate(&["home"]).expect_err("missing display");
    match err {
        SlotError::MissingChildDisplay { place, slot } => {
            assert_eq!(place.as_str(), "home");
            assert_eq!(slot, "home>inbox");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn children_under_non_composite_activity_fail() {
    let catalog = Catalog::builder()
        .root("home", &["inbox"])
        .child("inbox", "home", "inbox", &[])
        .activity("home", |a| a.hosts_children = Some(false))
        .build();
    let mut fx = Fixture::new(catalog);

    let err = fx.navigate(&["home"]).expect_err("not composite");
    assert!(matches!(
        &err,
        SlotError::NotComposite { place, children: 1 } if place.as_str() == "home"
    ));
    assert!(err.is_configuration());
}

#[test]
fn composite_activity_without_children_is_fine() {
    let catalog = Catalog::builder()
        .root("home", &[])
        .activity("home", |a| a.hosts_children = Some(true))
        .build();
    let mut fx = Fixture::new(catalog);
    fx.navigate(&["home"]).expect("navigate");
    assert_eq!(fx.journal(), vec!["start home"]);
}

#[test]
fn failure_stops_the_pass_before_children_start() {
    let catalog = Catalog::builder()
        .root("home", &["inbox"])
        .child("inbox", "home", "inbox", &[])
        .activity("home", |a| a.child_displays = false)
        .build();
    let mut fx = Fixture::new(catalog);

    fx.navigate(&["home"]).expect_err("missing display");
    assert_eq!(fx.journal(), vec!["start home"]);
    assert_eq!(fx.shown(), vec!["home", "-"]);
}
