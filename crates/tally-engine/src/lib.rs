//! tally-engine
//!
//! Counting state machine.
//!
//! - [`intake`] classifies raw text: ignored, rejected (no state change), or a move.
//! - [`apply_move`] runs one move against the [`SequenceState`] and the
//!   submitter's [`MemberRecord`], mutating the state in place and returning
//!   the ledger mutation, reaction and notice the caller must carry out.
//! - Edit and delete events only ever produce warnings ([`edit_notice`],
//!   [`deletion_notice`]).
//!
//! Deterministic, pure logic. No IO. The caller owns persistence and delivery.
//!
//! [`SequenceState`]: tally_schemas::SequenceState
//! [`MemberRecord`]: tally_schemas::MemberRecord

mod machine;
mod notices;
mod types;

pub use machine::{
    admin_reset, apply_move, clear_penalty, forget_current_member, intake,
};
pub use notices::{deletion_notice, edit_notice, online_notice};
pub use types::*;
