//! tally-ledger
//!
//! Durable-store contract for the counting game and an in-memory
//! implementation.
//!
//! - [`MemberLedger`]: typed per-member record operations (no raw query surface).
//! - [`GameStore`]: the ledger plus the single `SequenceState` document and
//!   the transactional [`GameStore::commit_move`] used by the runtime.
//! - [`InMemoryStore`]: process-local implementation for tests and for
//!   running the daemon without a database.

mod memory;
mod store;

pub use memory::InMemoryStore;
pub use store::{GameStore, MemberLedger, StoreError};
