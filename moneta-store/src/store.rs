use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadTransaction, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::sequence::SEQUENCES;

const DB_FILE: &str = "treasury.redb";

/// Handle to the embedded treasury database.
///
/// All writes go through [`Store::write`], which commits on `Ok` and lets the
/// transaction abort on every other exit path. Writers serialize on the
/// single redb write transaction, so two mutations against the same account
/// can never interleave; readers run on MVCC snapshots and do not block.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("db", &"Redb").finish()
    }
}

impl Store {
    /// Opens (or creates) the database under `data_dir`.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let path = data_dir.as_ref().join(DB_FILE);
        let db = Database::create(path)?;

        let store = Self { db: Arc::new(db) };
        store.write(|txn| {
            txn.open_table(SEQUENCES)?;
            Ok::<_, StoreError>(())
        })?;
        Ok(store)
    }

    /// Runs `f` inside a write transaction. The transaction commits only when
    /// `f` returns `Ok`; on `Err` (or a panic inside `f`) it is dropped and
    /// redb rolls the write back. The transaction never escapes the closure,
    /// so it cannot be held across an await point or leak on an early return.
    pub fn write<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&WriteTransaction) -> Result<R, E>,
    {
        let txn = self.db.begin_write().map_err(StoreError::from)?;
        let out = f(&txn)?;
        txn.commit().map_err(StoreError::from)?;
        Ok(out)
    }

    /// Runs `f` against a read snapshot.
    pub fn read<R, E, F>(&self, f: F) -> Result<R, E>
    where
        E: From<StoreError>,
        F: FnOnce(&ReadTransaction) -> Result<R, E>,
    {
        let txn = self.db.begin_read().map_err(StoreError::from)?;
        f(&txn)
    }
}

/// Encodes a row for storage.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

/// Decodes a stored row.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Bounds for a range scan over every key starting with `prefix`.
///
/// Keys are ASCII (ids, CAIP identifiers, zero-padded numbers), so a DEL
/// sentinel is a safe upper bound.
pub fn prefix_bounds(prefix: &str) -> (String, String) {
    (prefix.to_string(), format!("{}\u{7f}", prefix))
}
