//! Slot tree lifecycle manager.
//!
//! A screen is a tree of display slots. Navigating to a set of places decides,
//! slot by slot, which place each region shows; the tree then stops, starts,
//! and refreshes the activities behind those places so the UI matches the
//! navigation. The architecture keeps a strict split:
//!
//! - **[`core`]**: The slot tree, its veto/reconcile/reveal passes, and the
//!   traits activities and places implement. No I/O.
//! - **[`io`]**: Scenario files, harness config, and project scaffolding.
//!
//! [`scripted`] supplies data-driven places and activities, and [`harness`]
//! runs scenario steps against a real tree for the `slotted` binary.

pub mod core;
pub mod exit_codes;
pub mod harness;
pub mod io;
pub mod logging;
pub mod scripted;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
