//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `seller_transactions` - Seller transactions (key: tx_id)
//! - `seller_balances` - Seller balances (key: territory || seller || currency)
//! - `platform_balances` - Platform balances (key: territory || currency)
//! - `platform_revenue` - Platform revenue transactions (key: revenue_id)
//! - `platform_expenses` - Platform expense transactions (key: expense_id)
//! - `financial_transactions` - Financial transactions (key: ft_id)
//! - `status_history` - Append-only status history (key: ft_id || row_id)
//! - `payout_configs` / `fee_configs` - Versioned configuration rows (key: row_id)
//! - `indices` - Secondary indices for lookups and uniqueness
//!
//! Every write goes through a [`UnitOfWork`], committed as one RocksDB `WriteBatch`.

use crate::{
    balance::{PlatformFinancialBalance, SellerBalance, SellerBalanceKey},
    error::{Error, Result},
    financial::{
        FinancialTransaction, PlatformExpenseTransaction, PlatformRevenueTransaction,
        TransactionStatusHistory,
    },
    territory::{FeeConfig, ItemType, TerritoryPayoutConfig},
    transaction::{SellerTransaction, SellerTransactionStatus},
    types::{CheckoutId, Currency, PayoutId, TerritoryId, UserId},
    Config,
};
use parking_lot::Mutex;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, DBCompactionStyle, Direction, IteratorMode, Options,
    WriteBatch, WriteOptions, DB,
};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Column family names
const CF_SELLER_TRANSACTIONS: &str = "seller_transactions";
const CF_SELLER_BALANCES: &str = "seller_balances";
const CF_PLATFORM_BALANCES: &str = "platform_balances";
const CF_PLATFORM_REVENUE: &str = "platform_revenue";
const CF_PLATFORM_EXPENSES: &str = "platform_expenses";
const CF_FINANCIAL_TRANSACTIONS: &str = "financial_transactions";
const CF_STATUS_HISTORY: &str = "status_history";
const CF_PAYOUT_CONFIGS: &str = "payout_configs";
const CF_FEE_CONFIGS: &str = "fee_configs";
const CF_INDICES: &str = "indices";

const ALL_COLUMN_FAMILIES: [&str; 10] = [
    CF_SELLER_TRANSACTIONS,
    CF_SELLER_BALANCES,
    CF_PLATFORM_BALANCES,
    CF_PLATFORM_REVENUE,
    CF_PLATFORM_EXPENSES,
    CF_FINANCIAL_TRANSACTIONS,
    CF_STATUS_HISTORY,
    CF_PAYOUT_CONFIGS,
    CF_FEE_CONFIGS,
    CF_INDICES,
];

/// Index key layout. Fixed-width ids come first so prefixes never collide.
mod keys {
    use super::*;

    const CHECKOUT: &[u8] = b"chk";
    const STATUS: &[u8] = b"sts";
    const SELLER: &[u8] = b"slr";
    const PAYOUT: &[u8] = b"pay";
    const PAYOUT_FT: &[u8] = b"pft";
    const EXPENSE: &[u8] = b"exp";
    const REVENUE: &[u8] = b"rev";
    const FEE_ACTIVE: &[u8] = b"fee";
    pub(super) const PAYOUT_CONFIG_ACTIVE: &[u8] = b"tpc";
    const PAYOUT_CONFIG_HISTORY: &[u8] = b"tph";

    fn concat(parts: &[&[u8]]) -> Vec<u8> {
        parts.concat()
    }

    pub fn seller_balance(key: &SellerBalanceKey) -> Vec<u8> {
        concat(&[
            key.territory_id.as_bytes(),
            key.seller_id.as_bytes(),
            key.currency.as_bytes(),
        ])
    }

    pub fn platform_balance(territory: &TerritoryId, currency: &Currency) -> Vec<u8> {
        concat(&[territory.as_bytes(), currency.as_bytes()])
    }

    pub fn checkout(checkout: &CheckoutId) -> Vec<u8> {
        concat(&[CHECKOUT, checkout.as_bytes()])
    }

    pub fn status_prefix(territory: &TerritoryId, status: SellerTransactionStatus) -> Vec<u8> {
        concat(&[STATUS, territory.as_bytes(), &[status as u8]])
    }

    /// Arrival order: created timestamp, then the time-ordered id
    pub fn status(tx: &SellerTransaction, status: SellerTransactionStatus) -> Vec<u8> {
        let micros = u64::try_from(tx.created_at.timestamp_micros()).unwrap_or(0);
        let mut key = status_prefix(&tx.territory_id, status);
        key.extend_from_slice(&micros.to_be_bytes());
        key.extend_from_slice(tx.id.as_bytes());
        key
    }

    pub fn seller_prefix(territory: &TerritoryId, seller: &UserId) -> Vec<u8> {
        concat(&[SELLER, territory.as_bytes(), seller.as_bytes()])
    }

    pub fn seller(tx: &SellerTransaction) -> Vec<u8> {
        let mut key = seller_prefix(&tx.territory_id, &tx.seller_id);
        key.extend_from_slice(tx.id.as_bytes());
        key
    }

    pub fn payout_prefix(payout: &PayoutId) -> Vec<u8> {
        concat(&[PAYOUT, payout.as_str().as_bytes(), &[0]])
    }

    pub fn payout(payout: &PayoutId, tx_id: &Uuid) -> Vec<u8> {
        let mut key = payout_prefix(payout);
        key.extend_from_slice(tx_id.as_bytes());
        key
    }

    pub fn payout_financial_transaction(payout: &PayoutId) -> Vec<u8> {
        concat(&[PAYOUT_FT, payout.as_str().as_bytes()])
    }

    pub fn expense_prefix(payout: &PayoutId) -> Vec<u8> {
        concat(&[EXPENSE, payout.as_str().as_bytes(), &[0]])
    }

    pub fn expense(payout: &PayoutId, expense_id: &Uuid) -> Vec<u8> {
        let mut key = expense_prefix(payout);
        key.extend_from_slice(expense_id.as_bytes());
        key
    }

    pub fn revenue(checkout: &CheckoutId) -> Vec<u8> {
        concat(&[REVENUE, checkout.as_bytes()])
    }

    pub fn fee_active(territory: &TerritoryId, item_type: &ItemType) -> Vec<u8> {
        concat(&[FEE_ACTIVE, territory.as_bytes(), item_type.as_str().as_bytes()])
    }

    pub fn payout_config_active(territory: &TerritoryId) -> Vec<u8> {
        concat(&[PAYOUT_CONFIG_ACTIVE, territory.as_bytes()])
    }

    pub fn payout_config_history_prefix(territory: &TerritoryId) -> Vec<u8> {
        concat(&[PAYOUT_CONFIG_HISTORY, territory.as_bytes()])
    }

    pub fn payout_config_history(territory: &TerritoryId, config_id: &Uuid) -> Vec<u8> {
        let mut key = payout_config_history_prefix(territory);
        key.extend_from_slice(config_id.as_bytes());
        key
    }

    pub fn history_prefix(ft_id: &Uuid) -> Vec<u8> {
        ft_id.as_bytes().to_vec()
    }

    pub fn history(row: &TransactionStatusHistory) -> Vec<u8> {
        concat(&[row.financial_transaction_id.as_bytes(), row.id.as_bytes()])
    }
}

#[derive(Debug)]
enum WriteOp {
    Put {
        cf: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        cf: &'static str,
        key: Vec<u8>,
    },
}

/// Set of writes applied all-or-nothing by [`Storage::commit`]
///
/// Unique claims (e.g. one seller transaction per checkout) are checked
/// inside the commit; a claim that already exists aborts the whole unit.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    ops: Vec<WriteOp>,
    unique_claims: Vec<Vec<u8>>,
}

impl UnitOfWork {
    /// Empty unit of work
    pub fn new() -> Self {
        Self::default()
    }

    /// Nothing staged
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of staged writes
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    fn put<T: Serialize>(&mut self, cf: &'static str, key: Vec<u8>, value: &T) -> Result<()> {
        let value = bincode::serialize(value)?;
        self.ops.push(WriteOp::Put { cf, key, value });
        Ok(())
    }

    fn put_index(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(WriteOp::Put {
            cf: CF_INDICES,
            key,
            value,
        });
    }

    fn delete_index(&mut self, key: Vec<u8>) {
        self.ops.push(WriteOp::Delete { cf: CF_INDICES, key });
    }

    /// Stage a new seller transaction; claims its checkout id
    pub fn insert_seller_transaction(&mut self, tx: &SellerTransaction) -> Result<()> {
        self.put(CF_SELLER_TRANSACTIONS, tx.id.as_bytes().to_vec(), tx)?;

        let checkout_key = keys::checkout(&tx.checkout_id);
        self.unique_claims.push(checkout_key.clone());
        self.put_index(checkout_key, tx.id.as_bytes().to_vec());
        self.put_index(keys::status(tx, tx.status), Vec::new());
        self.put_index(keys::seller(tx), Vec::new());
        if let Some(payout_id) = &tx.payout_id {
            self.put_index(keys::payout(payout_id, &tx.id), Vec::new());
        }
        Ok(())
    }

    /// Stage an updated seller transaction, moving its status index entry
    pub fn update_seller_transaction(
        &mut self,
        tx: &SellerTransaction,
        previous_status: SellerTransactionStatus,
    ) -> Result<()> {
        self.put(CF_SELLER_TRANSACTIONS, tx.id.as_bytes().to_vec(), tx)?;

        if previous_status != tx.status {
            self.delete_index(keys::status(tx, previous_status));
            self.put_index(keys::status(tx, tx.status), Vec::new());
        }
        if let Some(payout_id) = &tx.payout_id {
            self.put_index(keys::payout(payout_id, &tx.id), Vec::new());
        }
        Ok(())
    }

    /// Stage a seller balance
    pub fn put_seller_balance(&mut self, balance: &SellerBalance) -> Result<()> {
        self.put(CF_SELLER_BALANCES, keys::seller_balance(&balance.key()), balance)
    }

    /// Stage a platform balance
    pub fn put_platform_balance(&mut self, balance: &PlatformFinancialBalance) -> Result<()> {
        self.put(
            CF_PLATFORM_BALANCES,
            keys::platform_balance(&balance.territory_id, &balance.currency),
            balance,
        )
    }

    /// Stage a financial transaction (insert or status update)
    pub fn put_financial_transaction(&mut self, ft: &FinancialTransaction) -> Result<()> {
        self.put(CF_FINANCIAL_TRANSACTIONS, ft.id.as_bytes().to_vec(), ft)
    }

    /// Stage a status history row (never overwritten)
    pub fn append_status_history(&mut self, row: &TransactionStatusHistory) -> Result<()> {
        self.put(CF_STATUS_HISTORY, keys::history(row), row)
    }

    /// Stage a platform revenue record
    pub fn insert_platform_revenue(&mut self, revenue: &PlatformRevenueTransaction) -> Result<()> {
        self.put(CF_PLATFORM_REVENUE, revenue.id.as_bytes().to_vec(), revenue)?;
        self.put_index(
            keys::revenue(&revenue.checkout_id),
            revenue.id.as_bytes().to_vec(),
        );
        Ok(())
    }

    /// Stage a platform expense record
    pub fn insert_platform_expense(&mut self, expense: &PlatformExpenseTransaction) -> Result<()> {
        self.put(CF_PLATFORM_EXPENSES, expense.id.as_bytes().to_vec(), expense)?;
        self.put_index(keys::expense(&expense.payout_id, &expense.id), Vec::new());
        Ok(())
    }

    /// Point a payout at its payout-side financial transaction
    pub fn index_payout_financial_transaction(&mut self, payout_id: &PayoutId, ft_id: Uuid) {
        self.put_index(
            keys::payout_financial_transaction(payout_id),
            ft_id.as_bytes().to_vec(),
        );
    }

    /// Stage a payout configuration row; active rows become the territory's pointer
    pub fn put_payout_config(&mut self, config: &TerritoryPayoutConfig) -> Result<()> {
        self.put(CF_PAYOUT_CONFIGS, config.id.as_bytes().to_vec(), config)?;
        self.put_index(
            keys::payout_config_history(&config.territory_id, &config.id),
            Vec::new(),
        );
        if config.is_active {
            self.put_index(
                keys::payout_config_active(&config.territory_id),
                config.id.as_bytes().to_vec(),
            );
        }
        Ok(())
    }

    /// Stage a fee configuration row; active rows become the (territory, item type) pointer
    pub fn put_fee_config(&mut self, config: &FeeConfig) -> Result<()> {
        self.put(CF_FEE_CONFIGS, config.id.as_bytes().to_vec(), config)?;
        if config.is_active {
            self.put_index(
                keys::fee_active(&config.territory_id, &config.item_type),
                config.id.as_bytes().to_vec(),
            );
        }
        Ok(())
    }
}

/// Storage wrapper for RocksDB
pub struct Storage {
    db: DB,
    sync_writes: bool,
    // Claim check + batch write must not interleave between commits
    commit_lock: Mutex<()>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("sync_writes", &self.sync_writes)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);
        db_opts.set_level_zero_file_num_compaction_trigger(
            config.rocksdb.level0_file_num_compaction_trigger,
        );
        db_opts.set_compaction_style(DBCompactionStyle::Level);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = ALL_COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!(
            "Opened RocksDB at {:?} with {} column families",
            path,
            ALL_COLUMN_FAMILIES.len()
        );

        Ok(Self {
            db,
            sync_writes: config.sync_writes,
            commit_lock: Mutex::new(()),
        })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        match name {
            CF_INDICES => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
                let mut block_opts = rocksdb::BlockBasedOptions::default();
                block_opts.set_bloom_filter(10.0, false);
                opts.set_block_based_table_factory(&block_opts);
            }
            CF_STATUS_HISTORY | CF_PLATFORM_REVENUE | CF_PLATFORM_EXPENSES => {
                // Append-only, rarely read
                opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
            }
            _ => {
                opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
            }
        }
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    fn get<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf_handle(cf)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn get_uuid_index(&self, key: &[u8]) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(uuid_from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_prefix(&self, cf: &str, prefix: &[u8]) -> Result<Vec<(Box<[u8]>, Box<[u8]>)>> {
        let cf = self.cf_handle(cf)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, value));
        }
        Ok(entries)
    }

    /// Trailing 16 bytes of each index key under `prefix`, as ids
    fn scan_trailing_ids(&self, prefix: &[u8]) -> Result<Vec<Uuid>> {
        self.scan_prefix(CF_INDICES, prefix)?
            .iter()
            .map(|(key, _)| {
                let start = key.len().checked_sub(16).ok_or_else(|| {
                    Error::Storage("index key shorter than an id".to_string())
                })?;
                uuid_from_slice(&key[start..])
            })
            .collect()
    }

    fn load_seller_transactions(&self, ids: Vec<Uuid>) -> Result<Vec<SellerTransaction>> {
        ids.into_iter()
            .map(|id| {
                self.seller_transaction(id)?
                    .ok_or_else(|| Error::TransactionNotFound(id.to_string()))
            })
            .collect()
    }

    // Seller transactions

    /// Get seller transaction by ID
    pub fn seller_transaction(&self, id: Uuid) -> Result<Option<SellerTransaction>> {
        self.get(CF_SELLER_TRANSACTIONS, id.as_bytes())
    }

    /// Seller transaction settling a checkout
    pub fn seller_transaction_id_for_checkout(&self, checkout: &CheckoutId) -> Result<Option<Uuid>> {
        self.get_uuid_index(&keys::checkout(checkout))
    }

    /// Transactions of a territory in a status, in arrival order
    pub fn seller_transactions_by_status(
        &self,
        territory: &TerritoryId,
        status: SellerTransactionStatus,
    ) -> Result<Vec<SellerTransaction>> {
        let ids = self.scan_trailing_ids(&keys::status_prefix(territory, status))?;
        self.load_seller_transactions(ids)
    }

    /// All transactions of one seller in a territory, in arrival order
    pub fn seller_transactions_by_seller(
        &self,
        territory: &TerritoryId,
        seller: &UserId,
    ) -> Result<Vec<SellerTransaction>> {
        let ids = self.scan_trailing_ids(&keys::seller_prefix(territory, seller))?;
        let mut transactions = self.load_seller_transactions(ids)?;
        transactions.sort_by_key(|tx| (tx.created_at, tx.id));
        Ok(transactions)
    }

    /// Transactions covered by a payout
    pub fn seller_transactions_by_payout(&self, payout: &PayoutId) -> Result<Vec<SellerTransaction>> {
        let ids = self.scan_trailing_ids(&keys::payout_prefix(payout))?;
        let mut transactions = self.load_seller_transactions(ids)?;
        transactions.sort_by_key(|tx| (tx.created_at, tx.id));
        Ok(transactions)
    }

    // Balances

    /// Get seller balance
    pub fn seller_balance(&self, key: &SellerBalanceKey) -> Result<Option<SellerBalance>> {
        self.get(CF_SELLER_BALANCES, &keys::seller_balance(key))
    }

    /// Get platform balance
    pub fn platform_balance(
        &self,
        territory: &TerritoryId,
        currency: &Currency,
    ) -> Result<Option<PlatformFinancialBalance>> {
        self.get(CF_PLATFORM_BALANCES, &keys::platform_balance(territory, currency))
    }

    // Financial records

    /// Get financial transaction
    pub fn financial_transaction(&self, id: Uuid) -> Result<Option<FinancialTransaction>> {
        self.get(CF_FINANCIAL_TRANSACTIONS, id.as_bytes())
    }

    /// Status history of a financial transaction, oldest first
    pub fn status_history(&self, ft_id: Uuid) -> Result<Vec<TransactionStatusHistory>> {
        self.scan_prefix(CF_STATUS_HISTORY, &keys::history_prefix(&ft_id))?
            .iter()
            .map(|(_, value)| Ok(bincode::deserialize(value)?))
            .collect()
    }

    /// Platform revenue recorded for a checkout
    pub fn platform_revenue_for_checkout(
        &self,
        checkout: &CheckoutId,
    ) -> Result<Option<PlatformRevenueTransaction>> {
        match self.get_uuid_index(&keys::revenue(checkout))? {
            Some(id) => self.get(CF_PLATFORM_REVENUE, id.as_bytes()),
            None => Ok(None),
        }
    }

    /// Platform expenses recorded for a payout
    pub fn platform_expenses_for_payout(
        &self,
        payout: &PayoutId,
    ) -> Result<Vec<PlatformExpenseTransaction>> {
        self.scan_trailing_ids(&keys::expense_prefix(payout))?
            .into_iter()
            .map(|id| {
                self.get(CF_PLATFORM_EXPENSES, id.as_bytes())?
                    .ok_or_else(|| Error::Storage(format!("expense {} missing", id)))
            })
            .collect()
    }

    /// Payout-side financial transaction of a payout
    pub fn payout_financial_transaction_id(&self, payout: &PayoutId) -> Result<Option<Uuid>> {
        self.get_uuid_index(&keys::payout_financial_transaction(payout))
    }

    // Configuration rows

    /// Active payout configuration of a territory
    pub fn active_payout_config(
        &self,
        territory: &TerritoryId,
    ) -> Result<Option<TerritoryPayoutConfig>> {
        match self.get_uuid_index(&keys::payout_config_active(territory))? {
            Some(id) => self.get(CF_PAYOUT_CONFIGS, id.as_bytes()),
            None => Ok(None),
        }
    }

    /// Every payout configuration row of a territory, oldest first
    pub fn payout_config_history(
        &self,
        territory: &TerritoryId,
    ) -> Result<Vec<TerritoryPayoutConfig>> {
        self.scan_trailing_ids(&keys::payout_config_history_prefix(territory))?
            .into_iter()
            .map(|id| {
                self.get(CF_PAYOUT_CONFIGS, id.as_bytes())?
                    .ok_or_else(|| Error::Storage(format!("payout config {} missing", id)))
            })
            .collect()
    }

    /// Territories that have an active payout configuration pointer
    pub fn territories_with_payout_config(&self) -> Result<Vec<TerritoryId>> {
        self.scan_trailing_ids(keys::PAYOUT_CONFIG_ACTIVE)
            .map(|ids| ids.into_iter().map(TerritoryId::from_uuid).collect())
    }

    /// Active fee configuration of (territory, item type)
    pub fn active_fee_config(
        &self,
        territory: &TerritoryId,
        item_type: &ItemType,
    ) -> Result<Option<FeeConfig>> {
        match self.get_uuid_index(&keys::fee_active(territory, item_type))? {
            Some(id) => self.get(CF_FEE_CONFIGS, id.as_bytes()),
            None => Ok(None),
        }
    }

    // Batch operations (atomic)

    /// Apply a unit of work as one atomic write
    pub fn commit(&self, unit: UnitOfWork) -> Result<()> {
        if unit.is_empty() {
            return Ok(());
        }

        let _guard = self.commit_lock.lock();

        for claim in &unit.unique_claims {
            if self.claim_exists(claim)? {
                return Err(Error::InvariantViolation(format!(
                    "unique key already written: {}",
                    hex_preview(claim)
                )));
            }
        }

        let mut batch = WriteBatch::default();
        for op in &unit.ops {
            match op {
                WriteOp::Put { cf, key, value } => batch.put_cf(self.cf_handle(cf)?, key, value),
                WriteOp::Delete { cf, key } => batch.delete_cf(self.cf_handle(cf)?, key),
            }
        }

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        tracing::debug!(writes = unit.ops.len(), "Unit of work committed");

        Ok(())
    }

    fn claim_exists(&self, claim: &[u8]) -> Result<bool> {
        let cf = self.cf_handle(CF_INDICES)?;
        Ok(self.db.get_pinned_cf(cf, claim)?.is_some())
    }

    // Statistics

    /// Get storage statistics
    pub fn get_stats(&self) -> Result<StorageStats> {
        Ok(StorageStats {
            seller_transactions: self.approximate_count(CF_SELLER_TRANSACTIONS)?,
            seller_balances: self.approximate_count(CF_SELLER_BALANCES)?,
            financial_transactions: self.approximate_count(CF_FINANCIAL_TRANSACTIONS)?,
        })
    }

    fn approximate_count(&self, cf: &str) -> Result<u64> {
        let cf = self.cf_handle(cf)?;
        let prop = self
            .db
            .property_int_value_cf(cf, "rocksdb.estimate-num-keys")?
            .unwrap_or(0);

        Ok(prop)
    }
}

fn uuid_from_slice(bytes: &[u8]) -> Result<Uuid> {
    Uuid::from_slice(bytes).map_err(|e| Error::Storage(format!("corrupt id in index: {}", e)))
}

fn hex_preview(bytes: &[u8]) -> String {
    bytes.iter().take(24).map(|b| format!("{:02x}", b)).collect()
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    /// Approximate seller transaction count
    pub seller_transactions: u64,
    /// Approximate seller balance count
    pub seller_balances: u64,
    /// Approximate financial transaction count
    pub financial_transactions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::sample_transaction;
    use chrono::Utc;
    use tempfile::TempDir;

    fn test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        config.sync_writes = false;
        (Storage::open(&config).unwrap(), temp_dir)
    }

    #[test]
    fn test_storage_open() {
        let (storage, _temp) = test_storage();
        for cf in ALL_COLUMN_FAMILIES {
            assert!(storage.db.cf_handle(cf).is_some());
        }
    }

    #[test]
    fn test_insert_and_index_transaction() {
        let (storage, _temp) = test_storage();
        let tx = sample_transaction(9_000);

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&tx).unwrap();
        storage.commit(unit).unwrap();

        let loaded = storage.seller_transaction(tx.id).unwrap().unwrap();
        assert_eq!(loaded.net_amount_cents, 9_000);
        assert_eq!(
            storage.seller_transaction_id_for_checkout(&tx.checkout_id).unwrap(),
            Some(tx.id)
        );

        let pending = storage
            .seller_transactions_by_status(&tx.territory_id, SellerTransactionStatus::Pending)
            .unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_duplicate_checkout_claim_rejected() {
        let (storage, _temp) = test_storage();
        let tx = sample_transaction(1_000);
        let mut duplicate = sample_transaction(1_000);
        duplicate.checkout_id = tx.checkout_id;

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&tx).unwrap();
        storage.commit(unit).unwrap();

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&duplicate).unwrap();
        let err = storage.commit(unit).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));

        // Nothing from the rejected unit is visible
        assert!(storage.seller_transaction(duplicate.id).unwrap().is_none());
    }

    #[test]
    fn test_status_index_moves_on_update() {
        let (storage, _temp) = test_storage();
        let mut tx = sample_transaction(2_000);

        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&tx).unwrap();
        storage.commit(unit).unwrap();

        tx.mark_ready(Utc::now()).unwrap();
        let mut unit = UnitOfWork::new();
        unit.update_seller_transaction(&tx, SellerTransactionStatus::Pending)
            .unwrap();
        storage.commit(unit).unwrap();

        let territory = tx.territory_id;
        assert!(storage
            .seller_transactions_by_status(&territory, SellerTransactionStatus::Pending)
            .unwrap()
            .is_empty());
        assert_eq!(
            storage
                .seller_transactions_by_status(&territory, SellerTransactionStatus::ReadyForPayout)
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_status_scan_preserves_arrival_order() {
        let (storage, _temp) = test_storage();
        let first = sample_transaction(100);
        let mut second = sample_transaction(200);
        second.territory_id = first.territory_id;
        second.created_at = first.created_at + chrono::Duration::seconds(1);

        // Insert out of order
        let mut unit = UnitOfWork::new();
        unit.insert_seller_transaction(&second).unwrap();
        unit.insert_seller_transaction(&first).unwrap();
        storage.commit(unit).unwrap();

        let pending = storage
            .seller_transactions_by_status(&first.territory_id, SellerTransactionStatus::Pending)
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|tx| tx.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
