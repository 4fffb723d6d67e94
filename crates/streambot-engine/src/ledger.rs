use std::sync::Arc;

use streambot_db::{Bucket, ReadTx, Store, StoreError, WriteTx};
use streambot_types::models::User;
use tracing::debug;

use crate::error::LedgerError;

/// Per-user point balances and profile metadata, stored in the `Users` partition.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<Store>,
}

impl Ledger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Fetch-or-create. An unknown id yields a zero-value record with
    /// `new = true`; nothing is written until the caller saves it.
    pub fn get(&self, user_id: &str) -> Result<User, StoreError> {
        let user = self.store.with_read(|tx| read_user(tx, user_id))?;
        Ok(user.unwrap_or_else(|| User::unseen(user_id)))
    }

    pub fn save(&self, user: &User) -> Result<(), StoreError> {
        self.store.with_write(|tx| write_user(tx, user))
    }

    /// Case-insensitive lookup by display name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        self.store.with_read(|tx| -> Result<_, StoreError> {
            for (key, raw) in tx.scan(Bucket::Users)? {
                let user = decode_user(&key, &raw)?;
                if user.display_name.eq_ignore_ascii_case(name) {
                    return Ok(Some(user));
                }
            }
            Ok(None)
        })
    }

    /// Adds `n` points and persists the record.
    pub fn give_points(&self, user: &mut User, n: u64) -> Result<(), StoreError> {
        self.adjust(user, |balance| balance.saturating_add(n))
    }

    /// Removes `n` points, bottoming out at zero, and persists the record.
    pub fn take_points(&self, user: &mut User, n: u64) -> Result<(), StoreError> {
        self.adjust(user, |balance| balance.saturating_sub(n))
    }

    /// Moves `n` points from `from` to the user `to_id` in one transaction.
    /// Nothing is written when the sender cannot cover `n`.
    pub fn transfer_points(&self, from: &mut User, n: u64, to_id: &str) -> Result<(), LedgerError> {
        let sender_balance = self.store.with_write(|tx| {
            let mut sender = stored_or(tx, from)?;
            if sender.points < n {
                return Err(LedgerError::InsufficientFunds {
                    balance: sender.points,
                    requested: n,
                });
            }
            sender.points -= n;
            write_user(tx, &sender)?;

            let mut recipient = read_user(tx, to_id)?.unwrap_or_else(|| User::unseen(to_id));
            recipient.points = recipient.points.saturating_add(n);
            write_user(tx, &recipient)?;

            let sender = read_user(tx, &from.id)?.unwrap_or(sender);
            Ok(sender.points)
        })?;

        debug!(from = %from.id, to = %to_id, points = n, "Transferred points");
        from.points = sender_balance;
        from.new = false;
        Ok(())
    }

    /// Applies `f` to the stored balance (or the caller's copy if nothing is
    /// stored yet) inside one write, so concurrent adjustments are not lost.
    fn adjust<F>(&self, user: &mut User, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(u64) -> u64,
    {
        let balance = self.store.with_write(|tx| {
            let mut record = stored_or(tx, user)?;
            record.points = f(record.points);
            write_user(tx, &record)?;
            Ok::<_, StoreError>(record.points)
        })?;
        user.points = balance;
        user.new = false;
        Ok(())
    }
}

/// Caller's record with the stored balance swapped in, if one exists.
fn stored_or(tx: &ReadTx<'_>, user: &User) -> Result<User, StoreError> {
    let mut record = user.clone();
    if let Some(stored) = read_user(tx, &user.id)? {
        record.points = stored.points;
    }
    Ok(record)
}

fn read_user(tx: &ReadTx<'_>, user_id: &str) -> Result<Option<User>, StoreError> {
    tx.get(Bucket::Users, user_id)?
        .map(|raw| decode_user(user_id, &raw))
        .transpose()
}

pub(crate) fn decode_user(key: &str, raw: &[u8]) -> Result<User, StoreError> {
    serde_json::from_slice(raw).map_err(|e| StoreError::CorruptRecord {
        bucket: Bucket::Users,
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn write_user(tx: &WriteTx<'_>, user: &User) -> Result<(), StoreError> {
    let raw = serde_json::to_vec(user).map_err(|e| StoreError::Encode {
        bucket: Bucket::Users,
        key: user.id.clone(),
        reason: e.to_string(),
    })?;
    tx.put(Bucket::Users, &user.id, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    fn saved(ledger: &Ledger, id: &str, name: &str, points: u64) -> User {
        let mut user = ledger.get(id).unwrap();
        user.display_name = name.to_string();
        user.points = points;
        ledger.save(&user).unwrap();
        ledger.get(id).unwrap()
    }

    #[test]
    fn get_unknown_user_is_new_and_not_written() {
        let ledger = ledger();
        let user = ledger.get("100").unwrap();
        assert!(user.new);
        assert_eq!(user.id, "100");
        assert_eq!(user.points, 0);

        assert!(ledger.get("100").unwrap().new, "get never writes");
    }

    #[test]
    fn saved_user_is_no_longer_new() {
        let ledger = ledger();
        let user = saved(&ledger, "1", "alice", 2500);
        assert!(!user.new);
        assert_eq!(user.points, 2500);
        assert_eq!(user.display_name, "alice");
    }

    #[test]
    fn take_points_saturates_at_zero() {
        let ledger = ledger();
        let mut user = saved(&ledger, "1", "alice", 3);

        ledger.take_points(&mut user, 10).unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(ledger.get("1").unwrap().points, 0);

        ledger.give_points(&mut user, 7).unwrap();
        ledger.take_points(&mut user, 2).unwrap();
        assert_eq!(ledger.get("1").unwrap().points, 5);
    }

    #[test]
    fn transfer_conserves_points() {
        let ledger = ledger();
        let mut alice = saved(&ledger, "1", "alice", 100);
        saved(&ledger, "2", "bob", 5);

        ledger.transfer_points(&mut alice, 40, "2").unwrap();

        assert_eq!(alice.points, 60);
        assert_eq!(ledger.get("1").unwrap().points, 60);
        assert_eq!(ledger.get("2").unwrap().points, 45);
    }

    #[test]
    fn transfer_to_unseen_user_creates_record() {
        let ledger = ledger();
        let mut alice = saved(&ledger, "1", "alice", 10);

        ledger.transfer_points(&mut alice, 10, "99").unwrap();
        let recipient = ledger.get("99").unwrap();
        assert!(!recipient.new);
        assert_eq!(recipient.points, 10);
        assert_eq!(ledger.get("1").unwrap().points, 0);
    }

    #[test]
    fn overdrawn_transfer_changes_nothing() {
        let ledger = ledger();
        let mut alice = saved(&ledger, "1", "alice", 10);
        saved(&ledger, "2", "bob", 5);

        let err = ledger.transfer_points(&mut alice, 11, "2").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds { balance: 10, requested: 11 }
        ));
        assert_eq!(ledger.get("1").unwrap().points, 10);
        assert_eq!(ledger.get("2").unwrap().points, 5);
    }

    #[test]
    fn transfer_to_self_is_neutral() {
        let ledger = ledger();
        let mut alice = saved(&ledger, "1", "alice", 10);
        ledger.transfer_points(&mut alice, 4, "1").unwrap();
        assert_eq!(alice.points, 10);
        assert_eq!(ledger.get("1").unwrap().points, 10);
    }

    #[test]
    fn find_by_name_ignores_case() {
        let ledger = ledger();
        saved(&ledger, "1", "Alice", 0);
        saved(&ledger, "2", "bob", 0);

        let found = ledger.find_by_name("alice").unwrap().expect("found");
        assert_eq!(found.id, "1");
        assert!(ledger.find_by_name("carol").unwrap().is_none());
    }

    #[test]
    fn corrupt_user_record_is_reported() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store
            .with_write(|tx| tx.put(Bucket::Users, "1", b"not json"))
            .unwrap();
        let ledger = Ledger::new(store);
        assert!(matches!(
            ledger.get("1"),
            Err(StoreError::CorruptRecord { .. })
        ));
    }
}
