use std::sync::Arc;

use chrono::{DateTime, Utc};
use streambot_db::{Bucket, Store, StoreError};
use streambot_types::models::CounterRecord;
use tracing::debug;

/// Named monotonic counters in the `Counters` partition.
#[derive(Clone)]
pub struct Counters {
    store: Arc<Store>,
}

impl Counters {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Adds one to `name` (creating it at 1) and returns the new value.
    /// The read, upgrade and write happen in a single write transaction.
    pub fn increment(&self, name: &str) -> Result<u64, StoreError> {
        let value = self.store.with_write(|tx| {
            let now = Utc::now();
            let mut record = match tx.get(Bucket::Counters, name)? {
                Some(raw) => decode_counter(name, &raw, now)?,
                None => CounterRecord {
                    name: name.to_string(),
                    value: 0,
                    time_updated: now,
                },
            };

            record.value = record.value.checked_add(1).ok_or_else(|| {
                StoreError::CorruptRecord {
                    bucket: Bucket::Counters,
                    key: name.to_string(),
                    reason: "counter is already at its maximum".to_string(),
                }
            })?;
            record.time_updated = now;

            let raw = serde_json::to_vec(&record).map_err(|e| StoreError::Encode {
                bucket: Bucket::Counters,
                key: name.to_string(),
                reason: e.to_string(),
            })?;
            tx.put(Bucket::Counters, name, &raw)?;
            Ok::<_, StoreError>(record.value)
        })?;

        debug!(counter = name, value, "Counter incremented");
        Ok(value)
    }

    pub fn get(&self, name: &str) -> Result<Option<CounterRecord>, StoreError> {
        self.store.with_read(|tx| -> Result<_, StoreError> {
            tx.get(Bucket::Counters, name)?
                .map(|raw| decode_counter(name, &raw, Utc::now()))
                .transpose()
        })
    }

    /// Every counter, in the partition's key order.
    pub fn list(&self) -> Result<Vec<CounterRecord>, StoreError> {
        self.store.with_read(|tx| -> Result<_, StoreError> {
            let now = Utc::now();
            tx.scan(Bucket::Counters)?
                .into_iter()
                .map(|(key, raw)| decode_counter(&key, &raw, now))
                .collect::<Result<Vec<_>, _>>()
        })
    }
}

/// Decodes either on-disk shape of a counter. A bare integer is the legacy
/// shape and is lifted into a record stamped `now`; anything that is neither
/// shape is corrupt.
pub fn decode_counter(
    name: &str,
    raw: &[u8],
    now: DateTime<Utc>,
) -> Result<CounterRecord, StoreError> {
    if let Ok(value) = serde_json::from_slice::<u64>(raw) {
        return Ok(CounterRecord {
            name: name.to_string(),
            value,
            time_updated: now,
        });
    }

    let mut record: CounterRecord =
        serde_json::from_slice(raw).map_err(|e| StoreError::CorruptRecord {
            bucket: Bucket::Counters,
            key: name.to_string(),
            reason: e.to_string(),
        })?;
    record.name = name.to_string();
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters() -> (Arc<Store>, Counters) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        (store.clone(), Counters::new(store))
    }

    #[test]
    fn first_increment_creates_counter() {
        let (_, counters) = counters();
        assert_eq!(counters.increment("wins").unwrap(), 1);
        assert_eq!(counters.increment("wins").unwrap(), 2);
        assert_eq!(counters.get("wins").unwrap().unwrap().value, 2);
        assert!(counters.get("losses").unwrap().is_none());
    }

    #[test]
    fn legacy_scalar_is_upgraded_on_increment() {
        let (store, counters) = counters();
        store
            .with_write(|tx| tx.put(Bucket::Counters, "deaths", b"41"))
            .unwrap();

        assert_eq!(counters.increment("deaths").unwrap(), 42);

        let raw = store
            .with_read(|tx| tx.get(Bucket::Counters, "deaths"))
            .unwrap()
            .unwrap();
        let stored: CounterRecord = serde_json::from_slice(&raw).expect("structured form");
        assert_eq!(stored.value, 42);

        assert_eq!(counters.increment("deaths").unwrap(), 43);
    }

    #[test]
    fn corrupt_counter_fails_and_is_left_alone() {
        let (store, counters) = counters();
        store
            .with_write(|tx| tx.put(Bucket::Counters, "bad", b"{\"oops\":true}"))
            .unwrap();

        assert!(matches!(
            counters.increment("bad"),
            Err(StoreError::CorruptRecord { .. })
        ));
        let raw = store
            .with_read(|tx| tx.get(Bucket::Counters, "bad"))
            .unwrap()
            .unwrap();
        assert_eq!(raw, b"{\"oops\":true}");
    }

    #[test]
    fn saturated_counter_fails_without_wedging_the_store() {
        let (store, counters) = counters();
        store
            .with_write(|tx| tx.put(Bucket::Counters, "max", b"18446744073709551615"))
            .unwrap();

        assert!(matches!(
            counters.increment("max"),
            Err(StoreError::CorruptRecord { .. })
        ));
        assert_eq!(counters.get("max").unwrap().unwrap().value, u64::MAX);
        assert_eq!(counters.increment("other").unwrap(), 1);
    }

    #[test]
    fn list_reads_both_shapes() {
        let (store, counters) = counters();
        store
            .with_write(|tx| tx.put(Bucket::Counters, "legacy", b"7"))
            .unwrap();
        counters.increment("modern").unwrap();

        let all = counters.list().unwrap();
        let pairs: Vec<_> = all.iter().map(|c| (c.name.as_str(), c.value)).collect();
        assert_eq!(pairs, [("legacy", 7), ("modern", 1)]);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (_, counters) = counters();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let counters = counters.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        counters.increment("hits").unwrap();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(counters.get("hits").unwrap().unwrap().value, 200);
    }
}
