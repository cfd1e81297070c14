//! tally-reconcile
//!
//! Status role reconciliation.
//!
//! Decisions:
//! - Reliable status follows ledger accuracy for every member in the dirty batch
//! - Exactly one member (or none) holds the penalty status
//! - A designated penalized member who is not present is dropped from the
//!   sequence state instead of receiving a grant
//! - Applying a plan to the holder sets it was computed from and planning
//!   again yields an empty plan
//!
//! Deterministic, pure logic. No IO. No role collaborator calls.

mod planner;
mod types;

pub use planner::{is_reliable, plan};
pub use types::*;
