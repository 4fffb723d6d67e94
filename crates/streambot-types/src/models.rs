use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Badge name -> tier. Holding the key means holding the badge.
pub type Badges = BTreeMap<String, u32>;

/// A chat participant as stored in the `Users` partition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub badges: Badges,
    #[serde(default)]
    pub points: u64,
    #[serde(default)]
    pub is_follower: bool,
    /// Set only on records synthesized for a user the store has never seen.
    #[serde(skip)]
    pub new: bool,
}

impl User {
    /// Zero-value record for an unseen user.
    pub fn unseen(id: &str) -> Self {
        Self {
            id: id.to_string(),
            new: true,
            ..Self::default()
        }
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.contains_key(badge)
    }
}

/// Current on-disk shape of a counter. The legacy shape is a bare integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRecord {
    #[serde(default)]
    pub name: String,
    pub value: u64,
    pub time_updated: DateTime<Utc>,
}

/// Row of the `Followers` partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerEntry {
    pub user_id: String,
    pub followed_at: DateTime<Utc>,
}

/// Result of an external profile lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub is_follower: bool,
}
