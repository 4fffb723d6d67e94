//! Seams to the collaborators the engine does not own: the chat transport,
//! the viewer broadcast layer and the profile service.

use streambot_types::events::BroadcastEvent;
use streambot_types::models::Profile;

use crate::error::{LookupError, SinkError};

/// Outbound half of the chat transport.
pub trait ChatSink: Send + Sync {
    fn send(&self, channel: &str, text: &str) -> Result<(), SinkError>;
}

/// Fan-out to connected viewers. Delivery is best-effort.
pub trait Broadcaster: Send + Sync {
    fn broadcast(&self, event: BroadcastEvent);
}

/// Read-only profile metadata keyed by user id.
pub trait ProfileLookup: Send + Sync {
    fn lookup(&self, user_id: &str) -> Result<Profile, LookupError>;

    /// Ids of every current follower, used to refresh the follower cache.
    fn followers(&self) -> Result<Vec<String>, LookupError>;
}

/// Profile lookup answering from a fixed follower list.
#[derive(Debug, Clone, Default)]
pub struct StaticProfiles {
    followers: Vec<String>,
}

impl StaticProfiles {
    pub fn new(followers: Vec<String>) -> Self {
        Self { followers }
    }
}

impl ProfileLookup for StaticProfiles {
    fn lookup(&self, user_id: &str) -> Result<Profile, LookupError> {
        Ok(Profile {
            user_id: user_id.to_string(),
            is_follower: self.followers.iter().any(|f| f == user_id),
        })
    }

    fn followers(&self) -> Result<Vec<String>, LookupError> {
        Ok(self.followers.clone())
    }
}
