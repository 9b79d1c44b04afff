//! Transactional key-value store backed by a single redb file
//!
//! Callers get a scoped read-only or read-write transaction through
//! [`KvStore::view`] and [`KvStore::update`]. A write transaction commits when
//! the closure returns `Ok` and is aborted otherwise, including on early exit.

use mra_common::{Error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, info};

const DEVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("devices");

/// Read access inside a transaction
pub trait ReadTxn {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All entries ordered by key
    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// Read-write access inside a transaction
pub trait WriteTxn: ReadTxn {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Returns whether the key existed
    fn remove(&mut self, key: &str) -> Result<bool>;
}

/// A store that hands out scoped transactions
pub trait KvStore: Send + Sync {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T>;

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T>;
}

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::Storage(e.to_string())
}

/// redb-backed [`KvStore`]
///
/// redb already serializes writers; the lock additionally keeps readers out
/// while a write transaction is open so a scan never straddles a commit.
pub struct RedbStore {
    db: Database,
    lock: RwLock<()>,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create the store file at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::validation("path", "", "database path is required"));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(storage_err)?;

        // Make sure the table exists so read transactions can open it.
        let write_txn = db.begin_write().map_err(storage_err)?;
        {
            let _table = write_txn.open_table(DEVICES).map_err(storage_err)?;
        }
        write_txn.commit().map_err(storage_err)?;

        info!("Opened device store at {}", path.display());

        Ok(Self {
            db,
            lock: RwLock::new(()),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

struct RedbRead {
    table: redb::ReadOnlyTable<&'static str, &'static [u8]>,
}

impl ReadTxn for RedbRead {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.table.get(key).map_err(storage_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        scan_table(&self.table)
    }
}

struct RedbWrite<'txn> {
    table: redb::Table<'txn, &'static str, &'static [u8]>,
}

impl ReadTxn for RedbWrite<'_> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let value = self.table.get(key).map_err(storage_err)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn scan(&self) -> Result<Vec<(String, Vec<u8>)>> {
        scan_table(&self.table)
    }
}

impl WriteTxn for RedbWrite<'_> {
    fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.table.insert(key, value).map_err(storage_err)?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let removed = self.table.remove(key).map_err(storage_err)?;
        Ok(removed.is_some())
    }
}

fn scan_table<T>(table: &T) -> Result<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut entries = Vec::new();
    for entry in table.iter().map_err(storage_err)? {
        let (key, value) = entry.map_err(storage_err)?;
        entries.push((key.value().to_string(), value.value().to_vec()));
    }
    Ok(entries)
}

impl KvStore for RedbStore {
    fn view<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn ReadTxn) -> Result<T>,
    {
        let _guard = self
            .lock
            .read()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;

        let read_txn = self.db.begin_read().map_err(storage_err)?;
        let table = read_txn.open_table(DEVICES).map_err(storage_err)?;
        f(&RedbRead { table })
    }

    fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn WriteTxn) -> Result<T>,
    {
        let _guard = self
            .lock
            .write()
            .map_err(|_| Error::Storage("store lock poisoned".to_string()))?;

        let write_txn = self.db.begin_write().map_err(storage_err)?;
        let result = {
            let table = write_txn.open_table(DEVICES).map_err(storage_err)?;
            let mut txn = RedbWrite { table };
            f(&mut txn)
        };

        match result {
            Ok(value) => {
                write_txn.commit().map_err(storage_err)?;
                Ok(value)
            }
            Err(e) => {
                debug!("Rolling back write transaction: {}", e);
                write_txn.abort().map_err(storage_err)?;
                Err(e)
            }
        }
    }
}
