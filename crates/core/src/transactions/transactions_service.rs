use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, warn};

use super::cost_basis_engine::{CostBasisEngine, PlannedWrite, TransactionMeta};
use super::transactions_model::{
    LedgerEntry, NewTransaction, ReversalReason, Transaction, TransactionType, TransactionUpdate,
};
use super::transactions_traits::TransactionServiceTrait;
use crate::config::EngineConfig;
use crate::errors::{DatabaseError, Result};
use crate::events::{DomainEvent, DomainEventSink};
use crate::holdings::{HoldingRef, NewHolding};
use crate::storage::{HoldingLockGuard, HoldingLocks, LedgerStoreTrait};
use crate::wallets::WalletBalanceTrait;

/// Which holding an operation writes to.
enum WriteTarget {
    Existing(String),
    /// Created by this operation unless a concurrent writer got there first.
    Create(NewHolding),
}

impl WriteTarget {
    /// New holdings are serialized on wallet + symbol until they have an id.
    fn lock_key(&self) -> String {
        match self {
            WriteTarget::Existing(holding_id) => holding_id.clone(),
            WriteTarget::Create(new_holding) => format!(
                "{}:{}",
                new_holding.wallet_id.trim(),
                new_holding.normalized_symbol()
            ),
        }
    }
}

/// Service recording, editing and reversing transactions.
pub struct TransactionService {
    store: Arc<dyn LedgerStoreTrait>,
    wallets: Arc<dyn WalletBalanceTrait>,
    locks: Arc<HoldingLocks>,
    event_sink: Arc<dyn DomainEventSink>,
    config: EngineConfig,
}

impl TransactionService {
    /// `locks` must be shared with every other service writing holdings.
    pub fn new(
        store: Arc<dyn LedgerStoreTrait>,
        wallets: Arc<dyn WalletBalanceTrait>,
        locks: Arc<HoldingLocks>,
        event_sink: Arc<dyn DomainEventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            wallets,
            locks,
            event_sink,
            config,
        }
    }

    /// Runs `operation` against a fresh working copy of the target holding
    /// and commits the result together with the wallet adjustment.
    ///
    /// The wallet adjustment, commit and any compensation run on a spawned
    /// task that owns the lock guard, so dropping the returned future cannot
    /// leave the wallet adjusted for a batch that was never committed.
    /// Write races are retried from a fresh read.
    async fn execute<T, F>(&self, mut target: WriteTarget, operation: F) -> Result<T>
    where
        T: Send,
        F: Fn(&mut CostBasisEngine) -> Result<T> + Send + Sync,
    {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 0;

        loop {
            let guard = self.locks.acquire(&target.lock_key()).await;

            let existing_id = match &target {
                WriteTarget::Create(new_holding) => self
                    .store
                    .find_holding(new_holding.wallet_id.trim(), &new_holding.normalized_symbol())?
                    .map(|holding| holding.id),
                WriteTarget::Existing(_) => None,
            };
            if let Some(holding_id) = existing_id {
                debug!("Holding {} already exists, writing to it", holding_id);
                target = WriteTarget::Existing(holding_id);
                continue;
            }

            attempt += 1;
            let mut engine = match &target {
                WriteTarget::Existing(holding_id) => {
                    let holding = self.store.get_holding(holding_id)?;
                    CostBasisEngine::load(self.store.as_ref(), holding)?
                }
                WriteTarget::Create(new_holding) => {
                    CostBasisEngine::create(new_holding.clone().into_holding())
                }
            };

            let output = operation(&mut engine)?;
            let holding_id = engine.holding().id.clone();

            let settlement = tokio::spawn(settle(
                engine.into_batch(),
                self.store.clone(),
                self.wallets.clone(),
                self.event_sink.clone(),
                guard,
            ));
            let settled = settlement.await.map_err(|err| {
                DatabaseError::Internal(format!(
                    "commit task for holding {} failed: {}",
                    holding_id, err
                ))
            })?;

            match settled {
                Ok(()) => return Ok(output),
                Err(err) if err.is_write_race() && attempt < max_attempts => {
                    warn!(
                        "Commit on holding {} lost a write race (attempt {}/{}): {}",
                        holding_id, attempt, max_attempts, err
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn resolve_target(
        &self,
        holding: HoldingRef,
        transaction_type: TransactionType,
    ) -> Result<WriteTarget> {
        match holding {
            HoldingRef::Id { holding_id } => Ok(WriteTarget::Existing(holding_id)),
            HoldingRef::Symbol(new_holding) => {
                new_holding.validate()?;
                let symbol = new_holding.normalized_symbol();
                let wallet_id = new_holding.wallet_id.trim();
                match self.store.find_holding(wallet_id, &symbol)? {
                    Some(existing) => Ok(WriteTarget::Existing(existing.id)),
                    None if transaction_type == TransactionType::Sell => {
                        Err(DatabaseError::NotFound(format!(
                            "holding {} in wallet {}",
                            symbol, wallet_id
                        ))
                        .into())
                    }
                    None => Ok(WriteTarget::Create(new_holding)),
                }
            }
        }
    }
}

/// Adjusts the wallet, commits the batch and announces it.
///
/// A rejected commit is compensated on the wallet before the error is
/// returned. `_guard` keeps the holding locked until this finishes.
async fn settle(
    planned: PlannedWrite,
    store: Arc<dyn LedgerStoreTrait>,
    wallets: Arc<dyn WalletBalanceTrait>,
    event_sink: Arc<dyn DomainEventSink>,
    _guard: HoldingLockGuard,
) -> Result<()> {
    let PlannedWrite {
        batch,
        wallet_id,
        cash_delta,
        creates_holding,
    } = planned;

    let holding_id = batch.holding.id.clone();
    let symbol = batch.holding.symbol.clone();
    let transaction_ids: Vec<String> = batch
        .appended_transactions
        .iter()
        .chain(batch.updated_transactions.iter())
        .map(|tx| tx.id.clone())
        .collect();

    if cash_delta != 0 {
        wallets.adjust_balance(&wallet_id, cash_delta).await?;
    }

    let holding = match store.commit(batch).await {
        Ok(holding) => holding,
        Err(err) => {
            compensate_wallet(wallets.as_ref(), &wallet_id, cash_delta).await;
            return Err(err);
        }
    };
    debug!(
        "Committed holding {} at version {} (wallet delta {})",
        holding.id, holding.version, cash_delta
    );

    let mut events = Vec::new();
    if creates_holding {
        events.push(DomainEvent::HoldingCreated {
            holding_id: holding_id.clone(),
            wallet_id: wallet_id.clone(),
            symbol,
        });
    }
    events.push(DomainEvent::transactions_changed(
        wallet_id,
        holding_id,
        transaction_ids,
    ));
    event_sink.emit_batch(events);
    Ok(())
}

/// Undoes a wallet adjustment whose commit was rejected.
async fn compensate_wallet(wallets: &dyn WalletBalanceTrait, wallet_id: &str, cash_delta: i64) {
    if cash_delta == 0 {
        return;
    }
    if let Err(err) = wallets.adjust_balance(wallet_id, -cash_delta).await {
        error!(
            "Failed to reverse wallet adjustment of {} on wallet {} after a rejected commit: {}. \
             The wallet balance needs manual reconciliation.",
            cash_delta, wallet_id, err
        );
    }
}

#[async_trait]
impl TransactionServiceTrait for TransactionService {
    async fn add_transaction(&self, new_transaction: NewTransaction) -> Result<Transaction> {
        let NewTransaction { holding, trade } = new_transaction;
        trade.validate()?;
        let target = self.resolve_target(holding, trade.transaction_type)?;

        let store = &self.store;
        self.execute(target, |engine| {
            engine.apply(&trade, TransactionMeta::new(store.next_sequence()))
        })
        .await
    }

    async fn edit_transaction(
        &self,
        transaction_id: &str,
        update: TransactionUpdate,
    ) -> Result<Transaction> {
        let original = self.store.get_transaction(transaction_id)?;
        let trade = update.into_trade(original.transaction_type);
        trade.validate()?;

        let store = &self.store;
        self.execute(WriteTarget::Existing(original.holding_id), |engine| {
            let reversal_sequence = store.next_sequence();
            let replacement =
                TransactionMeta::new(store.next_sequence()).superseding(transaction_id);
            engine.reverse(
                transaction_id,
                ReversalReason::Edited {
                    replacement_id: replacement.id.clone(),
                },
                reversal_sequence,
            )?;
            engine.apply(&trade, replacement)
        })
        .await
    }

    async fn delete_transaction(&self, transaction_id: &str) -> Result<()> {
        let original = self.store.get_transaction(transaction_id)?;

        let store = &self.store;
        self.execute(WriteTarget::Existing(original.holding_id), |engine| {
            engine.reverse(
                transaction_id,
                ReversalReason::Deleted,
                store.next_sequence(),
            )
        })
        .await?;
        Ok(())
    }

    fn get_transaction(&self, transaction_id: &str) -> Result<Transaction> {
        self.store.get_transaction(transaction_id)
    }

    fn list_transactions(
        &self,
        holding_id: &str,
        include_reversed: bool,
    ) -> Result<Vec<Transaction>> {
        let mut transactions: Vec<Transaction> = self
            .store
            .list_transactions(holding_id)?
            .into_iter()
            .filter(|tx| include_reversed || tx.is_active())
            .collect();
        transactions.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.sequence.cmp(&b.sequence))
        });
        Ok(transactions)
    }

    fn list_ledger_entries(&self, holding_id: &str) -> Result<Vec<LedgerEntry>> {
        self.store.list_ledger_entries(holding_id)
    }
}
