use std::sync::Arc;

use streambot_db::Store;

use crate::counters::Counters;
use crate::followers::FollowerCache;
use crate::ledger::Ledger;
use crate::sinks::{Broadcaster, ChatSink, ProfileLookup};
use crate::status::StreamStatus;

/// Everything an action handler may touch.
#[derive(Clone)]
pub struct Services {
    pub ledger: Ledger,
    pub counters: Counters,
    pub followers: FollowerCache,
    pub status: Arc<StreamStatus>,
    pub chat: Arc<dyn ChatSink>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl Services {
    pub fn new(
        store: Arc<Store>,
        chat: Arc<dyn ChatSink>,
        broadcaster: Arc<dyn Broadcaster>,
        profiles: Arc<dyn ProfileLookup>,
        streaming: bool,
    ) -> Self {
        Self {
            ledger: Ledger::new(store.clone()),
            counters: Counters::new(store.clone()),
            followers: FollowerCache::new(store, profiles),
            status: Arc::new(StreamStatus::new(streaming)),
            chat,
            broadcaster,
        }
    }
}
