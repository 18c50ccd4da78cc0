//! Transaction service trait.

use async_trait::async_trait;

use super::transactions_model::{LedgerEntry, NewTransaction, Transaction, TransactionUpdate};
use crate::errors::Result;

/// Trait defining the contract for transaction operations.
///
/// Every mutating call is atomic across lots, the holding aggregate, the
/// ledger and the wallet balance: it either fully applies or leaves all of
/// them untouched.
#[async_trait]
pub trait TransactionServiceTrait: Send + Sync {
    /// Records a BUY or SELL.
    ///
    /// A BUY naming an unknown wallet + symbol creates the holding first.
    async fn add_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction>;

    /// Replaces a transaction's parameters by reversing it and applying the
    /// replacement. Returns the replacement.
    async fn edit_transaction(
        &self,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> Result<Transaction>;

    /// Reverses a transaction's effects. The ledger keeps both records.
    async fn delete_transaction(&self, transaction_id: &str) -> Result<()>;

    fn get_transaction(&self, transaction_id: &str) -> Result<Transaction>;

    /// Transactions of a holding in ledger order.
    fn list_transactions(&self, holding_id: &str, include_reversed: bool)
        -> Result<Vec<Transaction>>;

    fn list_ledger_entries(&self, holding_id: &str) -> Result<Vec<LedgerEntry>>;
}
