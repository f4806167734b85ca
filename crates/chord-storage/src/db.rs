//! RocksDB backend

use crate::error::{StorageError, StorageResult};
use crate::state::ChangeSet;
use crate::traits::{LedgerReader, LedgerStore, LedgerWriter};
use chord_primitives::{u256_to_word, Address, Quantity, TokenId, U256};
use parking_lot::RwLock;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options, WriteBatch,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column family names
pub mod cf {
    /// (account, id) -> quantity
    pub const BALANCES: &str = "balances";
    /// id -> circulating quantity
    pub const SUPPLIES: &str = "supplies";
    /// (account, operator) -> approved flag
    pub const APPROVALS: &str = "approvals";
    /// Deployment metadata
    pub const META: &str = "meta";
}

/// All column family names
pub const ALL_CFS: &[&str] = &[cf::BALANCES, cf::SUPPLIES, cf::APPROVALS, cf::META];

type RocksDB = DBWithThreadMode<MultiThreaded>;

/// Database configuration
#[derive(Clone, Debug)]
pub struct DbConfig {
    /// Create database if missing
    pub create_if_missing: bool,
    /// Maximum number of open files
    pub max_open_files: i32,
    /// Write buffer size
    pub write_buffer_size: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024,
        }
    }
}

/// RocksDB handle with column family support
#[derive(Clone)]
pub struct Database {
    db: Arc<RwLock<Option<RocksDB>>>,
    path: PathBuf,
}

impl Database {
    /// Create a new database instance (not yet opened)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            db: Arc::new(RwLock::new(None)),
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Open the database with default config
    pub fn open(&self) -> StorageResult<()> {
        self.open_with_config(DbConfig::default())
    }

    /// Open the database with custom config
    pub fn open_with_config(&self, config: DbConfig) -> StorageResult<()> {
        let mut db_guard = self.db.write();
        if db_guard.is_some() {
            return Err(StorageError::AlreadyOpen);
        }

        let mut opts = Options::default();
        opts.create_if_missing(config.create_if_missing);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(config.max_open_files);
        opts.set_write_buffer_size(config.write_buffer_size);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = RocksDB::open_cf_descriptors(&opts, &self.path, cf_descriptors)?;
        tracing::debug!(path = %self.path.display(), "opened ledger database");
        *db_guard = Some(db);
        Ok(())
    }

    /// Close the database
    pub fn close(&self) {
        *self.db.write() = None;
    }

    /// Check if database is open
    pub fn is_open(&self) -> bool {
        self.db.read().is_some()
    }

    /// Database path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get a value from a column family
    pub fn get(&self, cf_name: &str, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = Self::cf_handle(db, cf_name)?;
        Ok(db.get_cf(&cf, key)?)
    }

    /// Put a value to a column family
    pub fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;
        let cf = Self::cf_handle(db, cf_name)?;
        db.put_cf(&cf, key, value)?;
        Ok(())
    }

    /// Write a set of `(cf, key, value)` puts in a single atomic batch
    pub fn write_puts<'a, I>(&self, puts: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (&'a str, Vec<u8>, Vec<u8>)>,
    {
        let db_guard = self.db.read();
        let db = db_guard.as_ref().ok_or(StorageError::NotOpen)?;

        let mut batch = WriteBatch::default();
        for (cf_name, key, value) in puts {
            let cf = Self::cf_handle(db, cf_name)?;
            batch.put_cf(&cf, key, value);
        }
        db.write(batch)?;
        Ok(())
    }

    fn cf_handle<'a>(db: &'a RocksDB, name: &str) -> StorageResult<Arc<BoundColumnFamily<'a>>> {
        db.cf_handle(name)
            .ok_or_else(|| StorageError::InvalidColumnFamily(name.to_string()))
    }
}

fn balance_key(account: &Address, id: &TokenId) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + 32);
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(&u256_to_word(id));
    key
}

fn approval_key(account: &Address, operator: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(40);
    key.extend_from_slice(account.as_bytes());
    key.extend_from_slice(operator.as_bytes());
    key
}

fn decode_quantity(bytes: Option<Vec<u8>>) -> StorageResult<Quantity> {
    match bytes {
        None => Ok(U256::zero()),
        Some(b) if b.len() == 32 => Ok(U256::from_big_endian(&b)),
        Some(b) => Err(StorageError::Deserialization(format!(
            "quantity must be 32 bytes, got {}",
            b.len()
        ))),
    }
}

/// Ledger state persisted in RocksDB
pub struct LedgerDb {
    db: Database,
}

impl LedgerDb {
    /// Wrap an opened database
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::new(path);
        db.open()?;
        Ok(Self::new(db))
    }

    /// Get the underlying database
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Read a metadata entry
    pub fn get_meta(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.db.get(cf::META, key.as_bytes())
    }

    /// Write a metadata entry
    pub fn put_meta(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        self.db.put(cf::META, key.as_bytes(), value)
    }
}

impl LedgerReader for LedgerDb {
    fn balance(&self, account: &Address, id: &TokenId) -> StorageResult<Quantity> {
        decode_quantity(self.db.get(cf::BALANCES, &balance_key(account, id))?)
    }

    fn total_supply(&self, id: &TokenId) -> StorageResult<Quantity> {
        decode_quantity(self.db.get(cf::SUPPLIES, &u256_to_word(id))?)
    }

    fn is_approved(&self, account: &Address, operator: &Address) -> StorageResult<bool> {
        let bytes = self.db.get(cf::APPROVALS, &approval_key(account, operator))?;
        Ok(matches!(bytes.as_deref(), Some([1])))
    }
}

impl LedgerWriter for LedgerDb {
    fn set_balance(&mut self, account: Address, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.db
            .put(cf::BALANCES, &balance_key(&account, &id), &u256_to_word(&amount))
    }

    fn set_total_supply(&mut self, id: TokenId, amount: Quantity) -> StorageResult<()> {
        self.db
            .put(cf::SUPPLIES, &u256_to_word(&id), &u256_to_word(&amount))
    }

    fn set_approval(&mut self, account: Address, operator: Address, approved: bool) -> StorageResult<()> {
        self.db
            .put(cf::APPROVALS, &approval_key(&account, &operator), &[approved as u8])
    }
}

impl LedgerStore for LedgerDb {
    fn commit(&mut self, changes: &ChangeSet) -> StorageResult<()> {
        let balances = changes.balances().map(|((account, id), amount)| {
            (cf::BALANCES, balance_key(account, id), u256_to_word(amount).to_vec())
        });
        let supplies = changes
            .supplies()
            .map(|(id, amount)| (cf::SUPPLIES, u256_to_word(id).to_vec(), u256_to_word(amount).to_vec()));
        let approvals = changes.approvals().map(|((account, operator), approved)| {
            (cf::APPROVALS, approval_key(account, operator), vec![*approved as u8])
        });
        self.db.write_puts(balances.chain(supplies).chain(approvals))
    }
}
