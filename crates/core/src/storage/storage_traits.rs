//! Ledger store trait.
//!
//! The trait is storage-agnostic. Reads are plain lookups; every mutation
//! goes through [`LedgerStoreTrait::commit`], which applies a whole
//! [`LedgerWriteBatch`] or nothing.

use async_trait::async_trait;

use crate::errors::Result;
use crate::holdings::Holding;
use crate::lots::Lot;
use crate::transactions::{LedgerEntry, Transaction};

/// Everything one engine operation writes, applied atomically.
#[derive(Debug, Clone)]
pub struct LedgerWriteBatch {
    /// Holding state after the operation.
    pub holding: Holding,
    /// Version read before planning. `None` creates the holding.
    pub expected_version: Option<i64>,
    pub created_lots: Vec<Lot>,
    pub updated_lots: Vec<Lot>,
    pub removed_lot_ids: Vec<String>,
    pub appended_transactions: Vec<Transaction>,
    /// Status changes (reversal markers) on existing transactions.
    pub updated_transactions: Vec<Transaction>,
    pub entries: Vec<LedgerEntry>,
}

impl LedgerWriteBatch {
    pub fn new(holding: Holding, expected_version: Option<i64>) -> Self {
        Self {
            holding,
            expected_version,
            created_lots: Vec::new(),
            updated_lots: Vec::new(),
            removed_lot_ids: Vec::new(),
            appended_transactions: Vec::new(),
            updated_transactions: Vec::new(),
            entries: Vec::new(),
        }
    }

    pub fn create_lot(&mut self, lot: Lot) {
        self.created_lots.push(lot);
    }

    pub fn update_lot(&mut self, lot: Lot) {
        self.updated_lots.push(lot);
    }

    pub fn remove_lot(&mut self, lot_id: String) {
        self.removed_lot_ids.push(lot_id);
    }

    pub fn append_transaction(&mut self, transaction: Transaction) {
        self.appended_transactions.push(transaction);
    }

    pub fn update_transaction(&mut self, transaction: Transaction) {
        self.updated_transactions.push(transaction);
    }

    pub fn record(&mut self, entry: LedgerEntry) {
        self.entries.push(entry);
    }
}

/// Trait defining the contract for the holdings ledger store.
#[async_trait]
pub trait LedgerStoreTrait: Send + Sync {
    fn get_holding(&self, holding_id: &str) -> Result<Holding>;

    /// Looks a holding up by wallet and (upper-cased) symbol.
    fn find_holding(&self, wallet_id: &str, symbol: &str) -> Result<Option<Holding>>;

    fn list_holdings(&self, wallet_id: Option<&str>) -> Result<Vec<Holding>>;

    /// All lots of a holding, open and closed.
    fn get_lots(&self, holding_id: &str) -> Result<Vec<Lot>>;

    /// Open lots ordered ascending by `purchased_at`, then lot id.
    fn get_open_lots(&self, holding_id: &str) -> Result<Vec<Lot>>;

    fn get_transaction(&self, transaction_id: &str) -> Result<Transaction>;

    /// All transactions of a holding, in ledger order.
    fn list_transactions(&self, holding_id: &str) -> Result<Vec<Transaction>>;

    fn list_ledger_entries(&self, holding_id: &str) -> Result<Vec<LedgerEntry>>;

    /// Hands out the next ledger sequence number.
    fn next_sequence(&self) -> u64;

    /// Applies the batch atomically and returns the stored holding with its
    /// new version. Fails with a version conflict when the holding changed
    /// since `expected_version` was read.
    async fn commit(&self, batch: LedgerWriteBatch) -> Result<Holding>;
}
