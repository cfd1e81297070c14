use std::sync::{Mutex, MutexGuard, PoisonError};

use tally_engine::{Notice, Reaction};
use tally_runtime::NoticeSink;
use tally_schemas::{ChannelId, MessageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Notice(ChannelId, Notice),
    Reaction(ChannelId, MessageId, Reaction),
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Notice(_, n) => Some(n),
                _ => None,
            })
            .collect()
    }

    pub fn reactions(&self) -> Vec<(MessageId, Reaction)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Reaction(_, m, r) => Some((m, r)),
                _ => None,
            })
            .collect()
    }

    pub fn last_notice(&self) -> Option<Notice> {
        self.notices().pop()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl NoticeSink for RecordingSink {
    fn notice(&self, channel_id: ChannelId, notice: &Notice) {
        self.lock()
            .push(SinkEvent::Notice(channel_id, notice.clone()));
    }

    fn react(&self, channel_id: ChannelId, message_id: MessageId, reaction: Reaction) {
        self.lock()
            .push(SinkEvent::Reaction(channel_id, message_id, reaction));
    }
}
