//! The lot-based cost basis engine.
//!
//! A [`CostBasisEngine`] is a working copy of one holding: its aggregate,
//! every lot and every ledger transaction. Buys, sells and reversals are
//! planned against the copy; nothing reaches the store until the caller
//! turns the copy into a [`LedgerWriteBatch`] and commits it. Several steps
//! (reverse + reapply for an edit) therefore land as one atomic write.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use uuid::Uuid;

use super::transactions_model::{
    LedgerEntry, ReversalReason, TradeRequest, Transaction, TransactionStatus, TransactionType,
};
use crate::errors::{CostBasisError, DatabaseError, Result, ValidationError};
use crate::holdings::holdings_aggregate::{
    apply_buy, apply_sell, check_consistency, reverse_buy, reverse_sell,
};
use crate::holdings::Holding;
use crate::lots::{consume_allocations, plan_fifo_sale, restore_allocations, Lot, LotAllocation};
use crate::storage::{LedgerStoreTrait, LedgerWriteBatch};
use crate::utils::scaled_math::{checked_sub, scaled_amount};

/// Identity assigned to a transaction before it is planned.
#[derive(Debug, Clone)]
pub struct TransactionMeta {
    pub id: String,
    pub sequence: u64,
    pub supersedes: Option<String>,
}

impl TransactionMeta {
    pub fn new(sequence: u64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sequence,
            supersedes: None,
        }
    }

    pub fn superseding(mut self, original_id: &str) -> Self {
        self.supersedes = Some(original_id.to_string());
        self
    }
}

/// Output of [`CostBasisEngine::into_batch`].
#[derive(Debug)]
pub struct PlannedWrite {
    pub batch: LedgerWriteBatch,
    pub wallet_id: String,
    /// Net wallet adjustment of every planned step.
    pub cash_delta: i64,
    pub creates_holding: bool,
}

/// Working copy of one holding's cost basis state.
pub struct CostBasisEngine {
    holding: Holding,
    expected_version: Option<i64>,
    lots: Vec<Lot>,
    transactions: Vec<Transaction>,
    created_lots: HashSet<String>,
    touched_lots: HashSet<String>,
    removed_lots: Vec<String>,
    appended_transactions: HashSet<String>,
    updated_transactions: HashSet<String>,
    entries: Vec<LedgerEntry>,
    cash_delta: i64,
    now: DateTime<Utc>,
}

impl CostBasisEngine {
    /// Loads an existing holding with its lots and ledger.
    pub fn load(store: &dyn LedgerStoreTrait, holding: Holding) -> Result<Self> {
        let lots = store.get_lots(&holding.id)?;
        let transactions = store.list_transactions(&holding.id)?;

        if cfg!(debug_assertions) {
            // Logs drift; the operation itself reports any real fault.
            check_consistency(&holding, &lots, &transactions)?;
        }

        Ok(Self::with_state(holding.version, holding, lots, transactions))
    }

    /// Starts from a holding that is not stored yet.
    pub fn create(holding: Holding) -> Self {
        let mut engine = Self::with_state(0, holding, Vec::new(), Vec::new());
        engine.expected_version = None;
        engine
    }

    fn with_state(
        version: i64,
        holding: Holding,
        lots: Vec<Lot>,
        transactions: Vec<Transaction>,
    ) -> Self {
        Self {
            holding,
            expected_version: Some(version),
            lots,
            transactions,
            created_lots: HashSet::new(),
            touched_lots: HashSet::new(),
            removed_lots: Vec::new(),
            appended_transactions: HashSet::new(),
            updated_transactions: HashSet::new(),
            entries: Vec::new(),
            cash_delta: 0,
            now: Utc::now(),
        }
    }

    pub fn holding(&self) -> &Holding {
        &self.holding
    }

    pub fn lots(&self) -> &[Lot] {
        &self.lots
    }

    /// Applies a BUY or SELL.
    pub fn apply(&mut self, trade: &TradeRequest, meta: TransactionMeta) -> Result<Transaction> {
        trade.validate()?;
        match trade.transaction_type {
            TransactionType::Buy => self.buy(trade, meta),
            TransactionType::Sell => self.sell(trade, meta),
        }
    }

    fn buy(&mut self, trade: &TradeRequest, meta: TransactionMeta) -> Result<Transaction> {
        let decimals = self.holding.quantity_decimals();
        let lot = Lot::from_purchase(
            &self.holding.id,
            trade.quantity,
            decimals,
            trade.price,
            trade.fees,
            trade.transaction_date,
        )?;
        debug!(
            "BUY {} of holding {}: lot {} total cost {}",
            trade.quantity, self.holding.id, lot.id, lot.total_cost
        );

        self.lots.push(lot.clone());
        self.created_lots.insert(lot.id.clone());
        apply_buy(&mut self.holding, &lot, &self.lots)?;

        let transaction = self.new_transaction(trade, meta, Some(lot.id), Vec::new(), 0, -lot.total_cost);
        Ok(self.append(transaction))
    }

    fn sell(&mut self, trade: &TradeRequest, meta: TransactionMeta) -> Result<Transaction> {
        let available = self.holding.quantity;
        if trade.quantity > available {
            return Err(CostBasisError::InsufficientQuantity {
                holding_id: self.holding.id.clone(),
                requested: trade.quantity,
                available,
                shortfall: trade.quantity - available,
            }
            .into());
        }

        let decimals = self.holding.quantity_decimals();
        let plan = plan_fifo_sale(
            &self.holding.id,
            &self.lots,
            trade.quantity,
            decimals,
            trade.price,
            trade.fees,
        )?;
        consume_allocations(&mut self.lots, &plan.allocations)?;
        for allocation in &plan.allocations {
            self.touched_lots.insert(allocation.lot_id.clone());
        }
        apply_sell(&mut self.holding, trade.quantity, plan.realized_pnl)?;

        let proceeds = scaled_amount(trade.quantity, decimals, trade.price, "sale proceeds")?;
        let cash_delta = checked_sub(proceeds, trade.fees, "sale cash")?;
        let lot_id = match plan.allocations.as_slice() {
            [single] => Some(single.lot_id.clone()),
            _ => None,
        };
        debug!(
            "SELL {} of holding {} across {} lot(s): realized {}",
            trade.quantity,
            self.holding.id,
            plan.allocations.len(),
            plan.realized_pnl
        );

        let transaction = self.new_transaction(
            trade,
            meta,
            lot_id,
            plan.allocations,
            plan.realized_pnl,
            cash_delta,
        );
        Ok(self.append(transaction))
    }

    /// Undoes an active transaction's lot, aggregate and wallet effects and
    /// appends a reversal entry. Returns the transaction as marked reversed.
    pub fn reverse(
        &mut self,
        transaction_id: &str,
        reason: ReversalReason,
        sequence: u64,
    ) -> Result<Transaction> {
        let original = self
            .transactions
            .iter()
            .find(|tx| tx.id == transaction_id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("transaction {}", transaction_id)))?;
        if !original.is_active() {
            return Err(CostBasisError::Conflict(format!(
                "transaction {} is already reversed",
                transaction_id
            ))
            .into());
        }

        match original.transaction_type {
            TransactionType::Buy => self.undo_buy(&original)?,
            TransactionType::Sell => self.undo_sell(&original)?,
        }
        self.cash_delta -= original.cash_delta;

        let entry = LedgerEntry::reversal(&original, sequence, reason, self.now);
        let mut reversed = original;
        reversed.status = TransactionStatus::Reversed;
        reversed.reversed_by = Some(entry.id().to_string());
        self.entries.push(entry);

        if let Some(slot) = self.transactions.iter_mut().find(|tx| tx.id == reversed.id) {
            *slot = reversed.clone();
        }
        if !self.appended_transactions.contains(&reversed.id) {
            self.updated_transactions.insert(reversed.id.clone());
        }
        Ok(reversed)
    }

    fn undo_buy(&mut self, original: &Transaction) -> Result<()> {
        let lot_id = original.lot_id.as_deref().ok_or_else(|| {
            ValidationError::InvalidInput(format!("BUY {} has no lot", original.id))
        })?;
        let index = self
            .lots
            .iter()
            .position(|lot| lot.id == lot_id)
            .ok_or_else(|| CostBasisError::CorruptLot {
                lot_id: lot_id.to_string(),
                reason: format!("lot of BUY {} is missing", original.id),
            })?;

        let lot = &self.lots[index];
        if !lot.is_untouched() {
            warn!(
                "Refusing to reverse BUY {}: lot {} already gave {} to later sells",
                original.id,
                lot.id,
                lot.consumed_quantity()
            );
            return Err(CostBasisError::Conflict(format!(
                "lot {} of transaction {} was partly sold ({} consumed); reverse the later sells first",
                lot.id,
                original.id,
                lot.consumed_quantity()
            ))
            .into());
        }
        if self.holding.quantity < lot.quantity {
            return Err(CostBasisError::CorruptLot {
                lot_id: lot.id.clone(),
                reason: format!(
                    "holding quantity {} is below the untouched lot size {}",
                    self.holding.quantity, lot.quantity
                ),
            }
            .into());
        }

        let lot = self.lots.remove(index);
        if !self.created_lots.remove(&lot.id) {
            self.removed_lots.push(lot.id.clone());
        }
        self.touched_lots.remove(&lot.id);
        reverse_buy(&mut self.holding, &lot, &self.lots)
    }

    fn undo_sell(&mut self, original: &Transaction) -> Result<()> {
        if let Some(later) = self.transactions.iter().find(|tx| {
            tx.is_active()
                && tx.transaction_type == TransactionType::Sell
                && tx.sequence > original.sequence
        }) {
            return Err(CostBasisError::Conflict(format!(
                "SELL {} was followed by SELL {}; reverse the later sell first",
                original.id, later.id
            ))
            .into());
        }

        restore_allocations(&mut self.lots, &original.lot_allocations)?;
        for allocation in &original.lot_allocations {
            if !self.created_lots.contains(&allocation.lot_id) {
                self.touched_lots.insert(allocation.lot_id.clone());
            }
        }
        reverse_sell(&mut self.holding, original.quantity, original.realized_pnl)
    }

    fn new_transaction(
        &self,
        trade: &TradeRequest,
        meta: TransactionMeta,
        lot_id: Option<String>,
        lot_allocations: Vec<LotAllocation>,
        realized_pnl: i64,
        cash_delta: i64,
    ) -> Transaction {
        Transaction {
            id: meta.id,
            sequence: meta.sequence,
            holding_id: self.holding.id.clone(),
            wallet_id: self.holding.wallet_id.clone(),
            transaction_type: trade.transaction_type,
            quantity: trade.quantity,
            price: trade.price,
            fees: trade.fees,
            transaction_date: trade.transaction_date,
            notes: trade.notes.clone(),
            lot_id,
            lot_allocations,
            realized_pnl,
            remaining_quantity: self.holding.quantity,
            cash_delta,
            status: TransactionStatus::Active,
            reversed_by: None,
            supersedes: meta.supersedes,
            created_at: self.now,
        }
    }

    fn append(&mut self, transaction: Transaction) -> Transaction {
        self.cash_delta += transaction.cash_delta;
        self.entries.push(LedgerEntry::applied(&transaction, self.now));
        self.appended_transactions.insert(transaction.id.clone());
        self.transactions.push(transaction.clone());
        transaction
    }

    /// Turns the planned steps into one store write.
    pub fn into_batch(self) -> PlannedWrite {
        let creates_holding = self.expected_version.is_none();
        let wallet_id = self.holding.wallet_id.clone();
        let mut batch = LedgerWriteBatch::new(self.holding, self.expected_version);

        for lot in self.lots {
            if self.created_lots.contains(&lot.id) {
                batch.create_lot(lot);
            } else if self.touched_lots.contains(&lot.id) {
                batch.update_lot(lot);
            }
        }
        for lot_id in self.removed_lots {
            batch.remove_lot(lot_id);
        }
        for transaction in self.transactions {
            if self.appended_transactions.contains(&transaction.id) {
                batch.append_transaction(transaction);
            } else if self.updated_transactions.contains(&transaction.id) {
                batch.update_transaction(transaction);
            }
        }
        for entry in self.entries {
            batch.record(entry);
        }

        PlannedWrite {
            batch,
            wallet_id,
            cash_delta: self.cash_delta,
            creates_holding,
        }
    }
}
