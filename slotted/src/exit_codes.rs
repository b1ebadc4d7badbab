//! Stable exit codes for `slotted` commands.

/// Command succeeded; every navigation was committed and revealed.
pub const OK: i32 = 0;
/// Invalid scenario, config, or a lifecycle configuration error.
pub const INVALID: i32 = 1;
/// `slotted run` declined at least one navigation on a stop warning.
pub const VETOED: i32 = 2;
/// `slotted run` ended with a slot still loading.
pub const STALLED: i32 = 3;
