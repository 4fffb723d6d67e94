use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use streambot_db::{Bucket, Store, StoreError};
use streambot_types::models::FollowerEntry;
use tracing::{debug, warn};

use crate::error::FollowerError;
use crate::ledger::{decode_user, write_user};
use crate::sinks::ProfileLookup;

/// Cached follower set in the `Followers` partition, backed by the profile lookup.
#[derive(Clone)]
pub struct FollowerCache {
    store: Arc<Store>,
    profiles: Arc<dyn ProfileLookup>,
}

impl FollowerCache {
    pub fn new(store: Arc<Store>, profiles: Arc<dyn ProfileLookup>) -> Self {
        Self { store, profiles }
    }

    /// Replaces the cached follower set with the lookup's current one and
    /// syncs `is_follower` on stored users, all in one transaction.
    /// Returns the number of followers cached.
    pub fn refresh(&self) -> Result<usize, FollowerError> {
        let current: HashSet<String> = self.profiles.followers()?.into_iter().collect();
        let now = Utc::now();

        let count = self.store.with_write(|tx| -> Result<_, StoreError> {
            let known: HashMap<String, FollowerEntry> = tx
                .scan(Bucket::Followers)?
                .into_iter()
                .filter_map(|(key, raw)| {
                    serde_json::from_slice::<FollowerEntry>(&raw)
                        .ok()
                        .map(|entry| (key, entry))
                })
                .collect();

            tx.clear(Bucket::Followers)?;
            for user_id in &current {
                let entry = known.get(user_id).cloned().unwrap_or_else(|| FollowerEntry {
                    user_id: user_id.clone(),
                    followed_at: now,
                });
                let raw = serde_json::to_vec(&entry).map_err(|e| StoreError::Encode {
                    bucket: Bucket::Followers,
                    key: user_id.clone(),
                    reason: e.to_string(),
                })?;
                tx.put(Bucket::Followers, user_id, &raw)?;
            }

            for (key, raw) in tx.scan(Bucket::Users)? {
                let mut user = decode_user(&key, &raw)?;
                let following = current.contains(&user.id);
                if user.is_follower != following {
                    user.is_follower = following;
                    write_user(tx, &user)?;
                }
            }

            Ok(current.len())
        })?;

        debug!(followers = count, "Follower cache refreshed");
        Ok(count)
    }

    /// Cache first, then a live lookup. A failed lookup counts as "no".
    pub fn is_follower(&self, user_id: &str) -> bool {
        match self
            .store
            .with_read(|tx| tx.get(Bucket::Followers, user_id))
        {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(e) => warn!(user_id, "Follower cache read failed: {}", e),
        }

        match self.profiles.lookup(user_id) {
            Ok(profile) => profile.is_follower,
            Err(e) => {
                warn!(user_id, "Profile lookup failed: {}", e);
                false
            }
        }
    }
}
