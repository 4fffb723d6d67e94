use std::sync::Arc;

use streambot_db::Store;

use crate::services::Services;
use crate::sinks::StaticProfiles;
use crate::testing::{RecordingBroadcaster, RecordingChat};

/// Live-streaming services over an in-memory store, with recorders attached.
pub(crate) fn services() -> (Services, Arc<RecordingChat>, Arc<RecordingBroadcaster>) {
    let chat = Arc::new(RecordingChat::default());
    let broadcaster = Arc::new(RecordingBroadcaster::default());
    let services = Services::new(
        Arc::new(Store::open_in_memory().unwrap()),
        chat.clone(),
        broadcaster.clone(),
        Arc::new(StaticProfiles::default()),
        true,
    );
    (services, chat, broadcaster)
}
