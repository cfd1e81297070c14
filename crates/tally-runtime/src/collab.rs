//! Outside collaborators the runtime talks to.

use std::collections::BTreeSet;
use std::fmt;

use async_trait::async_trait;
use tally_engine::{Notice, Reaction};
use tally_reconcile::Presence;
use tally_schemas::{ChannelId, MemberId, MessageId, RoleIntent, RoleKind};

/// Delivers announcements and reactions. Fire-and-forget: implementations
/// must not block and report their own failures.
pub trait NoticeSink: Send + Sync {
    fn notice(&self, channel_id: ChannelId, notice: &Notice);
    fn react(&self, channel_id: ChannelId, message_id: MessageId, reaction: Reaction);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleError {
    /// The member cannot be found in the space any more.
    MemberNotResolvable(MemberId),
    Transport(String),
}

impl fmt::Display for RoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MemberNotResolvable(id) => write!(f, "member {id} cannot be resolved"),
            Self::Transport(msg) => write!(f, "role directory transport error: {msg}"),
        }
    }
}

impl std::error::Error for RoleError {}

/// Membership and role holders of the space.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn holders(&self, role_kind: RoleKind) -> Result<BTreeSet<MemberId>, RoleError>;

    async fn presence(&self) -> Result<Presence, RoleError>;

    /// Carry out one role change. Success means the change was accepted for
    /// delivery, not that it has landed.
    async fn apply(&self, intent: RoleIntent) -> Result<(), RoleError>;
}
