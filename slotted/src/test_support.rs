//! Test-only helpers for building catalogs and driving slot trees.

use std::io::Write;
use std::rc::Rc;

use tempfile::NamedTempFile;

use crate::core::{EventBus, NodeId, PlaceId, PlaceParameters, SlotError, SlotTree};
pub use crate::scripted::{ActivitySpec, Catalog, Journal, RecordingDisplay, ScriptedController};

/// A tree wired to a scripted catalog and controller.
pub struct Fixture {
    pub catalog: Catalog,
    pub controller: Rc<ScriptedController>,
    pub display: Rc<RecordingDisplay>,
    pub bus: EventBus,
    pub tree: SlotTree,
}

impl Fixture {
    pub fn new(catalog: Catalog) -> Self {
        let controller = ScriptedController::new(&catalog);
        Self::with_controller(catalog, controller)
    }

    pub fn with_controller(catalog: Catalog, controller: ScriptedController) -> Self {
        let controller = Rc::new(controller);
        let display = catalog.root_display();
        let bus = EventBus::new();
        let tree = SlotTree::new(
            catalog.root_slot(),
            display.clone(),
            controller.clone(),
            bus.clone(),
        );
        Self {
            catalog,
            controller,
            display,
            bus,
            tree,
        }
    }

    /// Veto pass then reconcile, ignoring warnings. Returns the warnings.
    pub fn navigate(&mut self, ids: &[&str]) -> Result<Vec<String>, SlotError> {
        let places = self.catalog.places(ids);
        let warnings = self.tree.may_go_to(&places, false);
        let mut params = PlaceParameters::new();
        self.tree.reconcile(&mut params, &places, false)?;
        Ok(warnings)
    }

    /// Reconcile without a veto pass. Returns the collected parameters.
    pub fn reconcile(&mut self, ids: &[&str], reload_all: bool) -> Result<PlaceParameters, SlotError> {
        let places = self.catalog.places(ids);
        let mut params = PlaceParameters::new();
        self.tree.reconcile(&mut params, &places, reload_all)?;
        Ok(params)
    }

    /// First node, depth-first, currently showing `place`.
    pub fn node_for(&self, place: &str) -> Option<NodeId> {
        let id = PlaceId::from(place);
        self.tree.walk().into_iter().find(|node| {
            self.tree
                .node(*node)
                .and_then(|n| n.place())
                .is_some_and(|p| p.id() == id)
        })
    }

    /// Place ids of every node in depth-first order; `-` for empty nodes.
    pub fn shown(&self) -> Vec<String> {
        self.tree
            .walk()
            .into_iter()
            .filter_map(|id| self.tree.node(id))
            .map(|node| node.place().map_or_else(|| "-".to_string(), |p| p.id().to_string()))
            .collect()
    }

    /// Drain the journal.
    pub fn journal(&self) -> Vec<String> {
        self.catalog.journal().take()
    }
}

/// Root `R1` hosting slot `M` (default `M1`), which hosts slot `L`
/// (default `L1`). `M2` and `L2` are alternatives for the same slots.
pub fn three_level() -> Catalog {
    Catalog::builder()
        .root("R1", &["M1"])
        .child("M1", "R1", "M1", &["L1"])
        .child("M2", "R1", "M1", &[])
        .child("L1", "M1", "L1", &[])
        .child("L2", "M1", "L1", &[])
        .build()
}

/// Write `contents` to a temporary `.json` file.
pub fn scenario_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("create scenario file");
    file.write_all(contents.as_bytes())
        .expect("write scenario file");
    file
}
