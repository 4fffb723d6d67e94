pub mod error;
pub mod migrations;
pub mod queries;

use std::fmt;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};
use tracing::info;

pub use error::{Result, StoreError};
pub use queries::{ReadTx, WriteTx};

/// How long an open waits on a lock held by another process before failing with `Busy`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(1);

/// Named partitions of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Users,
    Followers,
    Counters,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Users, Bucket::Followers, Bucket::Counters];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Users => "Users",
            Bucket::Followers => "Followers",
            Bucket::Counters => "Counters",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedded key/value store. One connection, exclusively locked for the
/// life of the process; the mutex serializes every transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "locking_mode", "EXCLUSIVE")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        info!("Store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs `f` against a consistent snapshot. Nothing `f` does is written.
    pub fn with_read<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&ReadTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(StoreError::from)?;
        f(&ReadTx::new(&tx))
    }

    /// Runs `f` in a write transaction, committed only if `f` returns `Ok`.
    /// Any error rolls back everything `f` wrote.
    pub fn with_write<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&WriteTx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let out = f(&WriteTx::new(&tx))?;
        tx.commit().map_err(StoreError::from)?;
        Ok(out)
    }
}
