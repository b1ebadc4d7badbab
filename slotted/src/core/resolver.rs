//! Pick the place a slot should show for a navigation.

use std::rc::Rc;

use crate::core::place::{PlaceRef, Slot};

/// Resolve the place for `slot` among the places requested by a navigation.
///
/// Requested places are scanned in order and the first match wins: a place
/// with no owning slot matches the root slot, any other place matches the slot
/// it declares as its owner. When nothing matches, the slot keeps `current`
/// so unrelated slots are left alone, and falls back to its default place
/// only when it shows nothing yet.
pub fn resolve_place(requested: &[PlaceRef], slot: &Slot, current: Option<&PlaceRef>) -> PlaceRef {
    for place in requested {
        match place.owning_slot() {
            None if slot.is_root() => return Rc::clone(place),
            Some(owner) if owner == *slot => return Rc::clone(place),
            _ => {}
        }
    }
    match current {
        Some(current) => Rc::clone(current),
        None => Rc::clone(slot.default_place()),
    }
}
