//! Place and slot descriptors consumed by the slot tree.
//!
//! A [`Place`] names a navigable application state. A [`Slot`] names the
//! display region a place is shown in. Both are plain data holders: the tree
//! only compares them and asks places for their activity.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::core::activity::Activity;

/// Stable identity of a place. Two places are the same location iff their ids
/// are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(String);

impl PlaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A navigable location.
pub trait Place: fmt::Debug {
    fn id(&self) -> PlaceId;

    /// The slot this place is displayed in. `None` marks a root place.
    fn owning_slot(&self) -> Option<Slot>;

    /// Slots this place hosts for nested places.
    fn child_slots(&self) -> Vec<Slot> {
        Vec::new()
    }

    /// Build the activity for this place. Returning `None` defers to the
    /// controller's legacy mapper.
    fn create_activity(&self) -> Option<Box<dyn Activity>> {
        None
    }
}

pub type PlaceRef = Rc<dyn Place>;

/// True if both places name the same location.
pub fn same_place(a: &dyn Place, b: &dyn Place) -> bool {
    a.id() == b.id()
}

/// Identity of a display region: the place that owns it and the place shown
/// when a navigation does not name one.
#[derive(Clone)]
pub struct Slot {
    owner: Option<PlaceId>,
    default: PlaceRef,
}

impl Slot {
    pub fn new(owner: Option<PlaceId>, default: PlaceRef) -> Self {
        Self { owner, default }
    }

    /// The slot at the top of a tree. It has no owning place.
    pub fn root(default: PlaceRef) -> Self {
        Self::new(None, default)
    }

    pub fn owner(&self) -> Option<&PlaceId> {
        self.owner.as_ref()
    }

    pub fn default_place(&self) -> &PlaceRef {
        &self.default
    }

    pub fn is_root(&self) -> bool {
        self.owner.is_none()
    }
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.default.id() == other.default.id()
    }
}

impl Eq for Slot {}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("owner", &self.owner)
            .field("default", &self.default.id())
            .finish()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}>{}", owner, self.default.id()),
            None => write!(f, "root>{}", self.default.id()),
        }
    }
}

/// Navigation parameters accumulated across the tree during one reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceParameters(BTreeMap<String, String>);

impl PlaceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
