//! In-memory collaborators for tests. Built under `cfg(test)` or the
//! `test-util` feature.

use std::sync::Mutex;

use streambot_types::events::BroadcastEvent;

use crate::error::SinkError;
use crate::sinks::{Broadcaster, ChatSink};

/// Records every `(channel, text)` sent.
#[derive(Debug, Default)]
pub struct RecordingChat {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingChat {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.sent().into_iter().map(|(_, text)| text).collect()
    }
}

impl ChatSink for RecordingChat {
    fn send(&self, channel: &str, text: &str) -> Result<(), SinkError> {
        self.sent
            .lock()
            .map_err(|_| SinkError("recorder poisoned".into()))?
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }
}

/// Records every broadcast event.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    events: Mutex<Vec<BroadcastEvent>>,
}

impl RecordingBroadcaster {
    pub fn events(&self) -> Vec<BroadcastEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: BroadcastEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
