//! Scenario driver: runs scenario steps against a real slot tree.
//!
//! The harness plays the role of the application around the tree. It asks
//! the user (the scenario) about stop warnings, feeds deferred views and
//! loading changes back through the same handles an activity would use, and
//! reveals views once nothing is loading.

use std::rc::Rc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::core::{EventBus, NodeId, PlaceId, PlaceParameters, SlotTree, ViewPhase};
use crate::exit_codes;
use crate::io::config::HarnessConfig;
use crate::io::scenario::{NavigateStep, Scenario, Step};
use crate::scripted::{Catalog, ScriptedController};

/// What a step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Navigation committed; views revealed.
    Revealed,
    /// Work applied; the reveal waits on a slot that is still loading.
    Waiting { blocking: Option<String> },
    /// Work applied; auto reveal is off.
    Applied,
    /// A stop warning was declined; nothing changed.
    Declined,
    /// The addressed activity is gone; the input was dropped.
    Stale,
    /// Ping delivered to this many handlers.
    Pinged { handlers: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub step: String,
    pub warnings: Vec<String>,
    pub outcome: StepOutcome,
    pub journal: Vec<String>,
}

/// State of one node after the scenario.
#[derive(Debug, Clone, Serialize)]
pub struct SlotSnapshot {
    pub node: NodeId,
    pub depth: usize,
    pub slot: String,
    pub place: Option<String>,
    pub phase: ViewPhase,
    pub loading: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub steps: Vec<StepRecord>,
    pub declined: usize,
    /// Scenario ended with a slot still blocking the reveal.
    pub stalled: bool,
    pub parameters: PlaceParameters,
    pub tree: Vec<SlotSnapshot>,
}

impl HarnessReport {
    /// Exit code for `slotted run`. A stall outranks a declined navigation.
    pub fn exit_code(&self) -> i32 {
        if self.stalled {
            exit_codes::STALLED
        } else if self.declined > 0 {
            exit_codes::VETOED
        } else {
            exit_codes::OK
        }
    }

    /// Human-readable transcript: one block per step, then the final tree.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for record in &self.steps {
            out.push_str(&format!(
                "[{}] {} -> {}\n",
                record.index,
                record.step,
                outcome_label(&record.outcome)
            ));
            for warning in &record.warnings {
                out.push_str(&format!("    warning: {warning}\n"));
            }
            for line in &record.journal {
                out.push_str(&format!("    {line}\n"));
            }
        }
        out.push_str("tree:\n");
        for slot in &self.tree {
            let place = slot.place.as_deref().unwrap_or("-");
            let loading = if slot.loading { " loading" } else { "" };
            out.push_str(&format!(
                "{}{} {} [{:?}{}]\n",
                "  ".repeat(slot.depth + 1),
                slot.slot,
                place,
                slot.phase,
                loading
            ));
        }
        if !self.parameters.is_empty() {
            out.push_str("parameters:\n");
            for (key, value) in self.parameters.iter() {
                out.push_str(&format!("  {key} = {value}\n"));
            }
        }
        out
    }
}

fn outcome_label(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Revealed => "revealed".to_string(),
        StepOutcome::Waiting { blocking } => {
            format!("waiting on {}", blocking.as_deref().unwrap_or("an empty slot"))
        }
        StepOutcome::Applied => "applied".to_string(),
        StepOutcome::Declined => "declined".to_string(),
        StepOutcome::Stale => "stale".to_string(),
        StepOutcome::Pinged { handlers } => format!("pinged {handlers} handlers"),
    }
}

pub struct Harness {
    catalog: Catalog,
    controller: Rc<ScriptedController>,
    bus: EventBus,
    tree: SlotTree,
    config: HarnessConfig,
    parameters: PlaceParameters,
}

impl Harness {
    pub fn new(catalog: Catalog, config: &HarnessConfig) -> Self {
        let controller = Rc::new(ScriptedController::new(&catalog));
        controller.set_start_activities(config.start_activities);
        let bus = EventBus::new();
        let tree = SlotTree::new(
            catalog.root_slot(),
            catalog.root_display(),
            controller.clone(),
            bus.clone(),
        );
        Self {
            catalog,
            controller,
            bus,
            tree,
            config: config.clone(),
            parameters: PlaceParameters::new(),
        }
    }

    pub fn from_scenario(scenario: &Scenario, config: &HarnessConfig) -> Self {
        Self::new(scenario.catalog(), config)
    }

    pub fn tree(&self) -> &SlotTree {
        &self.tree
    }

    pub fn controller(&self) -> &ScriptedController {
        &self.controller
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run every step in order. Configuration errors and reveal precondition
    /// failures abort the run.
    #[instrument(skip_all, fields(steps = steps.len()))]
    pub fn run(&mut self, steps: &[Step]) -> Result<HarnessReport> {
        if steps.len() > self.config.max_steps {
            bail!(
                "scenario has {} steps, more than max_steps = {}",
                steps.len(),
                self.config.max_steps
            );
        }
        let mut records = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            let label = describe(step);
            let (warnings, outcome) = self
                .apply(step)
                .with_context(|| format!("step {} ({})", index + 1, label))?;
            info!(step = index + 1, %label, ?outcome, "step applied");
            records.push(StepRecord {
                index: index + 1,
                step: label,
                warnings,
                outcome,
                journal: self.catalog.journal().take(),
            });
        }
        let declined = records
            .iter()
            .filter(|r| r.outcome == StepOutcome::Declined)
            .count();
        let navigated = steps.iter().any(|s| matches!(s, Step::Navigate(_)));
        Ok(HarnessReport {
            steps: records,
            declined,
            stalled: navigated && self.tree.first_loading_node().is_some(),
            parameters: self.parameters.clone(),
            tree: self.snapshot(),
        })
    }

    fn apply(&mut self, step: &Step) -> Result<(Vec<String>, StepOutcome)> {
        match step {
            Step::Navigate(nav) => self.navigate(nav),
            Step::Deliver(id) => {
                if !self.catalog.deliver(&PlaceId::from(id.as_str())) {
                    return Ok((Vec::new(), StepOutcome::Stale));
                }
                Ok((Vec::new(), self.settle()?))
            }
            Step::Loaded(id) => {
                if !self.finish_loading(&PlaceId::from(id.as_str())) {
                    return Ok((Vec::new(), StepOutcome::Stale));
                }
                Ok((Vec::new(), self.settle()?))
            }
            Step::Reveal => {
                self.tree.show_views()?;
                Ok((Vec::new(), StepOutcome::Revealed))
            }
            Step::Ping => {
                let root = self.tree.root();
                let handlers = self
                    .tree
                    .node(root)
                    .map_or(0, |node| self.controller.ping(node.events()));
                Ok((Vec::new(), StepOutcome::Pinged { handlers }))
            }
        }
    }

    fn navigate(&mut self, nav: &NavigateStep) -> Result<(Vec<String>, StepOutcome)> {
        let places: Vec<_> = nav
            .places
            .iter()
            .map(|id| self.catalog.place(id.as_str()))
            .collect();
        let warnings = self.tree.may_go_to(&places, nav.reload_all);
        let confirm = nav.confirm.unwrap_or(self.config.veto.confirm);
        if !warnings.is_empty() && !confirm {
            debug!(warnings = warnings.len(), "navigation declined");
            return Ok((warnings, StepOutcome::Declined));
        }
        let mut parameters = PlaceParameters::new();
        self.tree
            .reconcile(&mut parameters, &places, nav.reload_all)
            .context("reconcile slot tree")?;
        self.parameters = parameters;
        Ok((warnings, self.settle()?))
    }

    /// Clear the loading flag of the activity showing `id`, as that activity
    /// would through its slot handle.
    fn finish_loading(&mut self, id: &PlaceId) -> bool {
        let Some((node, activity)) = self.tree.walk().into_iter().find_map(|node_id| {
            let node = self.tree.node(node_id)?;
            let showing = node.place().is_some_and(|place| place.id() == *id);
            showing.then_some((node_id, node.activity_id()?))
        }) else {
            return false;
        };
        self.tree.set_loading(node, false, activity)
    }

    fn settle(&mut self) -> Result<StepOutcome> {
        if !self.config.auto_reveal {
            return Ok(StepOutcome::Applied);
        }
        if let Some(node) = self.tree.first_loading_node() {
            let blocking = self
                .tree
                .node(node)
                .and_then(|n| n.place())
                .map(|place| place.id().to_string());
            return Ok(StepOutcome::Waiting { blocking });
        }
        self.tree.show_views().context("reveal views")?;
        Ok(StepOutcome::Revealed)
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.tree
            .walk()
            .into_iter()
            .filter_map(|id| {
                let node = self.tree.node(id)?;
                Some(SlotSnapshot {
                    node: id,
                    depth: self.depth(id),
                    slot: node.slot().to_string(),
                    place: node.place().map(|place| place.id().to_string()),
                    phase: node.phase(),
                    loading: node.is_loading(),
                })
            })
            .collect()
    }

    fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.tree.node(id).and_then(|node| node.parent());
        while let Some(parent) = current {
            depth += 1;
            current = self.tree.node(parent).and_then(|node| node.parent());
        }
        depth
    }
}

fn describe(step: &Step) -> String {
    match step {
        Step::Navigate(nav) => {
            let mut label = format!("navigate {}", nav.places.join(","));
            if nav.reload_all {
                label.push_str(" (reload all)");
            }
            label
        }
        Step::Deliver(id) => format!("deliver {id}"),
        Step::Loaded(id) => format!("loaded {id}"),
        Step::Reveal => "reveal".to_string(),
        Step::Ping => "ping".to_string(),
    }
}
