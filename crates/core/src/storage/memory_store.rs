use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use log::debug;

use super::storage_traits::{LedgerStoreTrait, LedgerWriteBatch};
use crate::errors::{DatabaseError, Result};
use crate::holdings::Holding;
use crate::lots::{sort_fifo, Lot};
use crate::transactions::{LedgerEntry, Transaction};

#[derive(Default)]
struct StoreState {
    holdings: HashMap<String, Holding>,
    lots: HashMap<String, Lot>,
    transactions: HashMap<String, Transaction>,
    entries: Vec<LedgerEntry>,
}

/// Process-local [`LedgerStoreTrait`] implementation.
///
/// A commit validates the whole batch under the write lock before touching
/// any row, so a rejected batch leaves no trace.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<StoreState>,
    sequence: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| DatabaseError::Internal("ledger store lock poisoned".to_string()).into())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| DatabaseError::Internal("ledger store lock poisoned".to_string()).into())
    }

    fn validate_batch(state: &StoreState, batch: &LedgerWriteBatch) -> Result<()> {
        let holding = &batch.holding;
        match batch.expected_version {
            None => {
                if state.holdings.contains_key(&holding.id) {
                    return Err(DatabaseError::UniqueViolation(format!(
                        "holding {} already exists",
                        holding.id
                    ))
                    .into());
                }
                if state
                    .holdings
                    .values()
                    .any(|h| h.wallet_id == holding.wallet_id && h.symbol == holding.symbol)
                {
                    return Err(DatabaseError::UniqueViolation(format!(
                        "wallet {} already holds {}",
                        holding.wallet_id, holding.symbol
                    ))
                    .into());
                }
            }
            Some(expected) => {
                let stored = state
                    .holdings
                    .get(&holding.id)
                    .ok_or_else(|| DatabaseError::NotFound(format!("holding {}", holding.id)))?;
                if stored.version != expected {
                    return Err(DatabaseError::VersionConflict {
                        holding_id: holding.id.clone(),
                        expected,
                        actual: stored.version,
                    }
                    .into());
                }
            }
        }

        for lot in &batch.created_lots {
            if state.lots.contains_key(&lot.id) {
                return Err(DatabaseError::UniqueViolation(format!("lot {}", lot.id)).into());
            }
        }
        for lot in &batch.updated_lots {
            match state.lots.get(&lot.id) {
                Some(stored) if stored.holding_id == lot.holding_id => {}
                _ => return Err(DatabaseError::NotFound(format!("lot {}", lot.id)).into()),
            }
        }
        for lot_id in &batch.removed_lot_ids {
            if !state.lots.contains_key(lot_id) {
                return Err(DatabaseError::NotFound(format!("lot {}", lot_id)).into());
            }
        }
        for tx in &batch.appended_transactions {
            if state.transactions.contains_key(&tx.id) {
                return Err(DatabaseError::UniqueViolation(format!("transaction {}", tx.id)).into());
            }
        }
        for tx in &batch.updated_transactions {
            if !state.transactions.contains_key(&tx.id) {
                return Err(DatabaseError::NotFound(format!("transaction {}", tx.id)).into());
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStoreTrait for InMemoryLedgerStore {
    fn get_holding(&self, holding_id: &str) -> Result<Holding> {
        self.read()?
            .holdings
            .get(holding_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("holding {}", holding_id)).into())
    }

    fn find_holding(&self, wallet_id: &str, symbol: &str) -> Result<Option<Holding>> {
        let symbol = symbol.trim().to_uppercase();
        Ok(self
            .read()?
            .holdings
            .values()
            .find(|h| h.wallet_id == wallet_id && h.symbol == symbol)
            .cloned())
    }

    fn list_holdings(&self, wallet_id: Option<&str>) -> Result<Vec<Holding>> {
        let mut holdings: Vec<Holding> = self
            .read()?
            .holdings
            .values()
            .filter(|h| wallet_id.map_or(true, |w| h.wallet_id == w))
            .cloned()
            .collect();
        holdings.sort_by(|a, b| {
            a.wallet_id
                .cmp(&b.wallet_id)
                .then_with(|| a.symbol.cmp(&b.symbol))
        });
        Ok(holdings)
    }

    fn get_lots(&self, holding_id: &str) -> Result<Vec<Lot>> {
        let mut lots: Vec<Lot> = self
            .read()?
            .lots
            .values()
            .filter(|lot| lot.holding_id == holding_id)
            .cloned()
            .collect();
        sort_fifo(&mut lots);
        Ok(lots)
    }

    fn get_open_lots(&self, holding_id: &str) -> Result<Vec<Lot>> {
        let mut lots = self.get_lots(holding_id)?;
        lots.retain(Lot::is_open);
        Ok(lots)
    }

    fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.read()?
            .transactions
            .get(transaction_id)
            .cloned()
            .ok_or_else(|| {
                DatabaseError::NotFound(format!("transaction {}", transaction_id)).into()
            })
    }

    fn list_transactions(&self, holding_id: &str) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .read()?
            .transactions
            .values()
            .filter(|tx| tx.holding_id == holding_id)
            .cloned()
            .collect();
        transactions.sort_by_key(|tx| tx.sequence);
        Ok(transactions)
    }

    fn list_ledger_entries(&self, holding_id: &str) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .read()?
            .entries
            .iter()
            .filter(|entry| entry.holding_id() == holding_id)
            .cloned()
            .collect())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn commit(&self, batch: LedgerWriteBatch) -> Result<Holding> {
        let mut state = self.write()?;
        Self::validate_batch(&state, &batch)?;

        let LedgerWriteBatch {
            mut holding,
            expected_version,
            created_lots,
            updated_lots,
            removed_lot_ids,
            appended_transactions,
            updated_transactions,
            entries,
        } = batch;

        holding.version = expected_version.map_or(1, |v| v + 1);
        holding.updated_at = Utc::now();
        debug!(
            "Committing holding {} v{}: +{} lots, ~{} lots, -{} lots, +{} transactions",
            holding.id,
            holding.version,
            created_lots.len(),
            updated_lots.len(),
            removed_lot_ids.len(),
            appended_transactions.len()
        );

        for lot in created_lots.into_iter().chain(updated_lots) {
            state.lots.insert(lot.id.clone(), lot);
        }
        for lot_id in removed_lot_ids {
            state.lots.remove(&lot_id);
        }
        for tx in appended_transactions.into_iter().chain(updated_transactions) {
            state.transactions.insert(tx.id.clone(), tx);
        }
        state.entries.extend(entries);
        state.holdings.insert(holding.id.clone(), holding.clone());

        Ok(holding)
    }
}
