//! Exit codes of the `triage` binary.

pub const SUCCESS: i32 = 0;
/// Some logs failed to parse or fetch, or classification stopped with work left.
pub const PARTIAL: i32 = 1;
/// Config, store or I/O error.
pub const INTERNAL_ERROR: i32 = 2;
