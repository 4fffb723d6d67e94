use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Badges;

/// Events delivered by the chat transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    ChatLine(ChatLine),
    Notice(Notice),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatLine {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub badges: Badges,
    pub channel: String,
    pub text: String,
}

/// Platform notification (subscription, raid, ...) with an opaque payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notice {
    /// Namespace of the trigger fired for this notice, e.g. `twitch`.
    pub source: String,
    /// Event-type tag, e.g. `sub` or `raid`.
    pub kind: String,
    pub user_id: String,
    pub display_name: String,
    pub channel: String,
    pub payload: BTreeMap<String, String>,
}

impl Notice {
    /// Name of the trigger this notice fires.
    pub fn trigger_name(&self) -> String {
        format!("{}::{}", self.source, self.kind)
    }
}

/// Events fanned out to connected viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum BroadcastEvent {
    /// A chat line from the main channel
    ChatMessage {
        user_id: String,
        display_name: String,
        color: String,
        badges: Badges,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// A platform notice was received
    Notice {
        source: String,
        kind: String,
        user_name: String,
        payload: BTreeMap<String, String>,
    },

    /// A counter was incremented
    CounterUpdated { name: String, value: u64 },

    /// Free-form announcement pushed by the `bot::Broadcast` action
    Announcement { text: String },
}
