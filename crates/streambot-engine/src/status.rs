use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Whether the stream is live, and since when.
#[derive(Debug, Default)]
pub struct StreamStatus {
    live_since: RwLock<Option<DateTime<Utc>>>,
}

impl StreamStatus {
    pub fn new(streaming: bool) -> Self {
        let status = Self::default();
        status.set_streaming(streaming);
        status
    }

    pub fn is_streaming(&self) -> bool {
        self.live_since().is_some()
    }

    pub fn live_since(&self) -> Option<DateTime<Utc>> {
        *self.live_since.read().unwrap_or_else(recover)
    }

    /// Going live stamps the start time; staying live keeps it.
    pub fn set_streaming(&self, streaming: bool) {
        let mut live_since = self.live_since.write().unwrap_or_else(recover);
        match (streaming, live_since.is_some()) {
            (true, false) => {
                *live_since = Some(Utc::now());
                info!("Stream is now live");
            }
            (false, true) => {
                *live_since = None;
                info!("Stream is now offline");
            }
            _ => {}
        }
    }
}

/// A panic while holding the lock cannot leave a torn `Option`, so the
/// value is still usable.
fn recover<G>(poisoned: PoisonError<G>) -> G {
    warn!("Stream status lock was poisoned, recovering");
    poisoned.into_inner()
}

/// Renders a duration as `1h 2m 3s`, dropping leading zero units.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m {seconds}s"),
        _ => format!("{hours}h {minutes}m {seconds}s"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_stream_tracks_start_time() {
        let status = StreamStatus::new(false);
        assert!(!status.is_streaming());

        status.set_streaming(true);
        let started = status.live_since().expect("live");
        status.set_streaming(true);
        assert_eq!(status.live_since(), Some(started), "start time is kept");

        status.set_streaming(false);
        assert!(status.live_since().is_none());
    }

    #[test]
    fn poisoned_lock_still_toggles() {
        let status = std::sync::Arc::new(StreamStatus::new(true));
        let holder = status.clone();
        let result = std::thread::spawn(move || {
            let _guard = holder.live_since.write().unwrap();
            panic!("panicked while holding the status lock");
        })
        .join();
        assert!(result.is_err());
        assert!(status.live_since.is_poisoned());

        assert!(status.is_streaming());
        status.set_streaming(false);
        assert!(!status.is_streaming());
        status.set_streaming(true);
        assert!(status.live_since().is_some());
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(Duration::seconds(5)), "5s");
        assert_eq!(format_elapsed(Duration::seconds(65)), "1m 5s");
        assert_eq!(format_elapsed(Duration::seconds(3723)), "1h 2m 3s");
        assert_eq!(format_elapsed(Duration::seconds(-3)), "0s");
    }
}
