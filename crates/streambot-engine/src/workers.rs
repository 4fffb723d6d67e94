//! Long-lived background tasks. Each stops when its `CancellationToken`
//! fires, and a failed cycle is logged and retried on the next tick.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use streambot_types::models::CounterRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::counters::Counters;
use crate::followers::FollowerCache;
use crate::sinks::ChatSink;
use crate::status::format_elapsed;

/// Starts the counter report pair: a producer that snapshots the watched
/// counters every `period` and a reporter that posts them to `channel`.
/// Returns no tasks when `names` is empty.
pub fn spawn_counter_report(
    counters: Counters,
    names: &[String],
    period: Duration,
    chat: Arc<dyn ChatSink>,
    channel: String,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    if names.is_empty() {
        debug!("No counters to report");
        return Vec::new();
    }

    info!(counters = ?names, every = ?period, "Starting counter report");
    let (tx, rx) = mpsc::channel(1);
    let watched = names.iter().cloned().collect();
    vec![
        tokio::spawn(produce_counter_snapshots(counters, watched, period, tx, cancel.clone())),
        tokio::spawn(report_counters(rx, chat, channel, cancel)),
    ]
}

/// Sends the watched counters every `period`, starting one period from now.
pub async fn produce_counter_snapshots(
    counters: Counters,
    watched: HashSet<String>,
    period: Duration,
    tx: mpsc::Sender<Vec<CounterRecord>>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let listing = {
            let counters = counters.clone();
            tokio::task::spawn_blocking(move || counters.list()).await
        };
        let snapshot: Vec<CounterRecord> = match listing {
            Ok(Ok(all)) => all.into_iter().filter(|c| watched.contains(&c.name)).collect(),
            Ok(Err(e)) => {
                warn!("Counter snapshot failed: {}", e);
                continue;
            }
            Err(e) => {
                warn!("Counter snapshot task failed: {}", e);
                continue;
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(snapshot) => {
                if sent.is_err() {
                    debug!("Counter reporter gone, stopping snapshots");
                    break;
                }
            }
        }
    }
}

/// Posts "time since last <name>" for every counter in each snapshot.
pub async fn report_counters(
    mut rx: mpsc::Receiver<Vec<CounterRecord>>,
    chat: Arc<dyn ChatSink>,
    channel: String,
    cancel: CancellationToken,
) {
    loop {
        let snapshot = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(snapshot) => snapshot,
                None => break,
            },
        };

        let now = Utc::now();
        for counter in snapshot {
            let text = format!(
                "time since last {}: {}",
                counter.name,
                format_elapsed(now - counter.time_updated)
            );
            if let Err(e) = chat.send(&channel, &text) {
                warn!(counter = %counter.name, "Counter report not sent: {}", e);
            }
        }
    }
}

/// Refreshes the follower cache now and then every `period`.
pub async fn run_follower_refresh(cache: FollowerCache, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let cache = cache.clone();
        match tokio::task::spawn_blocking(move || cache.refresh()).await {
            Ok(Ok(count)) => debug!(followers = count, "Followers refreshed"),
            Ok(Err(e)) => warn!("Follower refresh failed: {}", e),
            Err(e) => warn!("Follower refresh task failed: {}", e),
        }
    }
}
