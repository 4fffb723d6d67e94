use rusqlite::ErrorCode;
use thiserror::Error;

use crate::Bucket;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process holds the store file.
    #[error("store is busy: another process holds the database lock")]
    Busy,

    #[error("corrupt record '{key}' in {bucket}: {reason}")]
    CorruptRecord {
        bucket: Bucket,
        key: String,
        reason: String,
    },

    #[error("could not encode record '{key}' for {bucket}: {reason}")]
    Encode {
        bucket: Bucket,
        key: String,
        reason: String,
    },

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StoreError::Busy,
            _ => StoreError::Sqlite(e),
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
