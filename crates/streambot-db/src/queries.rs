use std::ops::Deref;

use rusqlite::Connection;

use crate::Bucket;
use crate::error::Result;

/// Read access to the partitions inside an open transaction.
pub struct ReadTx<'a> {
    conn: &'a Connection,
}

impl<'a> ReadTx<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT value FROM entries WHERE bucket = ?1 AND key = ?2")?;
        let value = stmt
            .query_row([bucket.as_str(), key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Every entry of `bucket`, in key order.
    pub fn scan(&self, bucket: Bucket) -> Result<Vec<(String, Vec<u8>)>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map([bucket.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Read/write access inside a write transaction.
pub struct WriteTx<'a> {
    read: ReadTx<'a>,
}

impl<'a> WriteTx<'a> {
    pub(crate) fn new(conn: &'a Connection) -> Self {
        Self {
            read: ReadTx::new(conn),
        }
    }

    /// Inserts or replaces the value stored under `key`.
    pub fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<()> {
        let mut stmt = self.read.conn.prepare_cached(
            "INSERT INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(bucket, key) DO UPDATE SET value = excluded.value",
        )?;
        stmt.execute(rusqlite::params![bucket.as_str(), key, value])?;
        Ok(())
    }

    /// Returns whether a value was removed.
    pub fn delete(&self, bucket: Bucket, key: &str) -> Result<bool> {
        let removed = self.read.conn.execute(
            "DELETE FROM entries WHERE bucket = ?1 AND key = ?2",
            [bucket.as_str(), key],
        )?;
        Ok(removed > 0)
    }

    /// Empties `bucket`, returning the number of entries removed.
    pub fn clear(&self, bucket: Bucket) -> Result<usize> {
        let removed = self
            .read
            .conn
            .execute("DELETE FROM entries WHERE bucket = ?1", [bucket.as_str()])?;
        Ok(removed)
    }
}

impl<'a> Deref for WriteTx<'a> {
    type Target = ReadTx<'a>;

    fn deref(&self) -> &Self::Target {
        &self.read
    }
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Bucket, Store};

    #[test]
    fn scan_is_key_ordered_and_scoped() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_write(|tx| {
                tx.put(Bucket::Counters, "b", b"2")?;
                tx.put(Bucket::Counters, "a", b"1")?;
                tx.put(Bucket::Users, "c", b"3")
            })
            .unwrap();

        let rows = store.with_read(|tx| tx.scan(Bucket::Counters)).unwrap();
        let keys: Vec<_> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn put_replaces_and_delete_removes() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_write(|tx| {
                tx.put(Bucket::Users, "1", b"old")?;
                tx.put(Bucket::Users, "1", b"new")
            })
            .unwrap();
        assert_eq!(
            store.with_read(|tx| tx.get(Bucket::Users, "1")).unwrap(),
            Some(b"new".to_vec())
        );

        let removed = store.with_write(|tx| tx.delete(Bucket::Users, "1")).unwrap();
        assert!(removed);
        let removed_again = store.with_write(|tx| tx.delete(Bucket::Users, "1")).unwrap();
        assert!(!removed_again);
    }

    #[test]
    fn clear_only_touches_one_bucket() {
        let store = Store::open_in_memory().unwrap();
        store
            .with_write(|tx| {
                tx.put(Bucket::Followers, "1", b"x")?;
                tx.put(Bucket::Followers, "2", b"y")?;
                tx.put(Bucket::Users, "1", b"z")
            })
            .unwrap();

        let cleared = store.with_write(|tx| tx.clear(Bucket::Followers)).unwrap();
        assert_eq!(cleared, 2);
        assert!(store.with_read(|tx| tx.scan(Bucket::Followers)).unwrap().is_empty());
        assert_eq!(store.with_read(|tx| tx.scan(Bucket::Users)).unwrap().len(), 1);
    }
}
