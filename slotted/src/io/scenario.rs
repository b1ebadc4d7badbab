//! Scenario files: a place catalog plus the steps to drive through it.
//!
//! Scenarios are JSON, checked against `schemas/scenario/v1.schema.json` and
//! then against the catalog invariants the schema cannot express.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::PlaceId;
use crate::scripted::{Catalog, PlaceSpec, SlotSpec};

pub const SCENARIO_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../schemas/scenario/v1.schema.json"
));

pub const SCENARIO_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub version: u32,
    /// Default place of the root slot.
    pub root: String,
    pub places: BTreeMap<String, PlaceSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One action of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Veto pass, then reconcile unless a warning is declined.
    Navigate(NavigateStep),
    /// Supply the view of a deferred activity.
    Deliver(String),
    /// Clear the loading flag of a place's activity.
    Loaded(String),
    /// Reveal all views; fails while any slot is loading.
    Reveal,
    /// Fire a ping through the event bus.
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigateStep {
    pub places: Vec<String>,
    #[serde(default)]
    pub reload_all: bool,
    /// Answer to stop warnings; the config default applies when absent.
    #[serde(default)]
    pub confirm: Option<bool>,
}

impl Scenario {
    /// Build the place catalog described by this scenario.
    pub fn catalog(&self) -> Catalog {
        let specs = self
            .places
            .iter()
            .map(|(id, spec)| (PlaceId::from(id.as_str()), spec.clone()))
            .collect();
        Catalog::new(self.root.as_str(), specs)
    }
}

/// Load, schema-check, and invariant-check a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_scenario(&raw).with_context(|| format!("load scenario {}", path.display()))
}

pub fn parse_scenario(raw: &str) -> Result<Scenario> {
    let value: Value = serde_json::from_str(raw).context("parse scenario json")?;
    validate_schema(&value)?;
    let scenario: Scenario =
        serde_json::from_value(value).context("deserialize scenario as v1 struct")?;
    let errors = validate_scenario(&scenario);
    if !errors.is_empty() {
        bail!("scenario invariant violations:\n- {}", errors.join("\n- "));
    }
    debug!(
        places = scenario.places.len(),
        steps = scenario.steps.len(),
        "scenario loaded"
    );
    Ok(scenario)
}

fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SCENARIO_SCHEMA).context("parse scenario schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Check catalog invariants not expressible in JSON Schema:
/// - `version` is supported
/// - the root place exists and declares no slot
/// - every slot reference names existing places
/// - a slot's default place is shown in that same slot
/// - every slot a place is shown in is declared by its owner
/// - steps only name existing places
pub fn validate_scenario(scenario: &Scenario) -> Vec<String> {
    let mut errors = Vec::new();
    if scenario.version != SCENARIO_VERSION {
        errors.push(format!(
            "unsupported version {} (expected {})",
            scenario.version, SCENARIO_VERSION
        ));
    }

    match scenario.places.get(&scenario.root) {
        None => errors.push(format!("root place '{}' is not defined", scenario.root)),
        Some(spec) if spec.slot.is_some() => errors.push(format!(
            "root place '{}' must not declare a slot",
            scenario.root
        )),
        Some(_) => {}
    }

    for (id, spec) in &scenario.places {
        if let Some(slot) = &spec.slot {
            validate_slot_ref(scenario, id, slot, &mut errors);
        }
        for default in &spec.children {
            let expected = SlotSpec {
                owner: id.clone(),
                default: default.clone(),
            };
            match scenario.places.get(default) {
                None => errors.push(format!("{id}: child slot default '{default}' is not defined")),
                Some(child) if child.slot.as_ref() != Some(&expected) => errors.push(format!(
                    "{id}: child slot default '{default}' must be shown in slot {id}>{default}"
                )),
                Some(_) => {}
            }
        }
    }

    for (index, step) in scenario.steps.iter().enumerate() {
        for id in step_places(step) {
            if !scenario.places.contains_key(id) {
                errors.push(format!("step {}: unknown place '{}'", index + 1, id));
            }
        }
    }
    errors
}

fn validate_slot_ref(scenario: &Scenario, id: &str, slot: &SlotSpec, errors: &mut Vec<String>) {
    let Some(owner) = scenario.places.get(&slot.owner) else {
        errors.push(format!("{id}: slot owner '{}' is not defined", slot.owner));
        return;
    };
    if !owner.children.contains(&slot.default) {
        errors.push(format!(
            "{id}: owner '{}' does not declare a slot with default '{}'",
            slot.owner, slot.default
        ));
    }
    if !scenario.places.contains_key(&slot.default) {
        errors.push(format!("{id}: slot default '{}' is not defined", slot.default));
    }
}

fn step_places(step: &Step) -> Vec<&String> {
    match step {
        Step::Navigate(nav) => nav.places.iter().collect(),
        Step::Deliver(id) | Step::Loaded(id) => vec![id],
        Step::Reveal | Step::Ping => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::init::SAMPLE_SCENARIO;

    #[test]
    fn sample_scenario_is_valid() {
        let scenario = parse_scenario(SAMPLE_SCENARIO).expect("sample parses");
        assert_eq!(scenario.root, "home");
        assert!(!scenario.steps.is_empty());
    }

    #[test]
    fn steps_use_external_tagging() {
        let raw = r#"{
            "version": 1,
            "root": "home",
            "places": { "home": {} },
            "steps": ["reveal", {"navigate": {"places": ["home"]}}, {"deliver": "home"}]
        }"#;
        let scenario = parse_scenario(raw).expect("parse");
        assert_eq!(scenario.steps[0], Step::Reveal);
        assert_eq!(
            scenario.steps[1],
            Step::Navigate(NavigateStep {
                places: vec!["home".to_string()],
                reload_all: false,
                confirm: None,
            })
        );
        assert_eq!(scenario.steps[2], Step::Deliver("home".to_string()));
    }

    #[test]
    fn schema_rejects_unknown_fields() {
        let raw = r#"{"version": 1, "root": "home", "places": {"home": {"colour": "red"}}, "steps": []}"#;
        let err = parse_scenario(raw).expect_err("schema failure");
        assert!(format!("{:#}", err).contains("schema validation failed"));
    }

    #[test]
    fn invariants_report_broken_slots() {
        let raw = r#"{
            "version": 1,
            "root": "home",
            "places": {
                "home": { "children": ["inbox"] },
                "inbox": { "slot": { "owner": "home", "default": "drafts" } },
                "orphan": { "slot": { "owner": "nobody", "default": "orphan" } }
            },
            "steps": [ { "loaded": "ghost" } ]
        }"#;
        let value: Value = serde_json::from_str(raw).expect("json");
        let scenario: Scenario = serde_json::from_value(value).expect("struct");
        let errors = validate_scenario(&scenario);

        assert!(errors.iter().any(|e| e.contains("must be shown in slot home>inbox")));
        assert!(errors.iter().any(|e| e.contains("does not declare a slot with default 'drafts'")));
        assert!(errors.iter().any(|e| e.contains("slot owner 'nobody'")));
        assert!(errors.iter().any(|e| e.contains("unknown place 'ghost'")));
    }

    #[test]
    fn invariants_reject_root_with_slot() {
        let raw = r#"{
            "version": 1,
            "root": "home",
            "places": { "home": { "slot": { "owner": "home", "default": "home" } } },
            "steps": []
        }"#;
        let scenario: Scenario = serde_json::from_str(raw).expect("struct");
        let errors = validate_scenario(&scenario);
        assert!(errors.iter().any(|e| e.contains("must not declare a slot")));
    }
}
