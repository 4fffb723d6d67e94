use rusqlite::Connection;
use tracing::info;

use crate::Bucket;
use crate::error::Result;

/// Creates the schema and any missing partitions. Runs under `BEGIN EXCLUSIVE`,
/// which also takes the file lock the store keeps for its lifetime.
pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("BEGIN EXCLUSIVE;")?;

    match migrate(conn) {
        Ok(()) => {
            conn.execute_batch("COMMIT;")?;
            Ok(())
        }
        Err(e) => {
            conn.execute_batch("ROLLBACK;").ok();
            Err(e)
        }
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Store: running migration v1 (partitioned key/value schema)");
        conn.execute_batch(
            "
            CREATE TABLE buckets (
                name        TEXT PRIMARY KEY,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE entries (
                bucket  TEXT NOT NULL REFERENCES buckets(name),
                key     TEXT NOT NULL,
                value   BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    for bucket in Bucket::ALL {
        conn.execute(
            "INSERT OR IGNORE INTO buckets (name) VALUES (?1)",
            [bucket.as_str()],
        )?;
    }

    Ok(())
}
