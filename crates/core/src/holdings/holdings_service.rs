use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};

use super::holdings_aggregate::{apply_price, check_consistency};
use super::holdings_model::{ConsistencyReport, Holding, NewHolding, PortfolioSummary};
use super::holdings_traits::HoldingServiceTrait;
use crate::config::EngineConfig;
use crate::errors::{DatabaseError, Result, ValidationError};
use crate::events::{DomainEvent, DomainEventSink};
use crate::lots::Lot;
use crate::storage::{HoldingLocks, LedgerStoreTrait, LedgerWriteBatch};
use crate::utils::scaled_math::{checked_add, percent_of};

/// Writes a new current price to one holding under its lock.
///
/// Shared by manual pricing and the valuation refresher. Lost write races
/// are retried from a fresh read up to `max_attempts` times.
pub(crate) async fn commit_price(
    store: &dyn LedgerStoreTrait,
    locks: &HoldingLocks,
    holding_id: &str,
    price: i64,
    priced_at: DateTime<Utc>,
    max_attempts: u32,
) -> Result<Holding> {
    let _guard = locks.acquire(holding_id).await;
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let mut holding = store.get_holding(holding_id)?;
        let version = holding.version;
        apply_price(&mut holding, price, priced_at)?;

        match store
            .commit(LedgerWriteBatch::new(holding, Some(version)))
            .await
        {
            Ok(committed) => return Ok(committed),
            Err(err) if err.is_write_race() && attempt < max_attempts => {
                warn!(
                    "Price write on holding {} lost a race (attempt {}/{}): {}",
                    holding_id, attempt, max_attempts, err
                );
            }
            Err(err) => return Err(err),
        }
    }
}

/// Service for holding lifecycle, manual pricing and read models.
pub struct HoldingService {
    store: Arc<dyn LedgerStoreTrait>,
    locks: Arc<HoldingLocks>,
    event_sink: Arc<dyn DomainEventSink>,
    config: EngineConfig,
}

impl HoldingService {
    pub fn new(
        store: Arc<dyn LedgerStoreTrait>,
        locks: Arc<HoldingLocks>,
        event_sink: Arc<dyn DomainEventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            locks,
            event_sink,
            config,
        }
    }
}

#[async_trait]
impl HoldingServiceTrait for HoldingService {
    async fn create_holding(&self, new_holding: NewHolding) -> Result<Holding> {
        new_holding.validate()?;
        let wallet_id = new_holding.wallet_id.trim().to_string();
        let symbol = new_holding.normalized_symbol();
        let _guard = self
            .locks
            .acquire(&format!("{}:{}", wallet_id, symbol))
            .await;

        if self.store.find_holding(&wallet_id, &symbol)?.is_some() {
            return Err(DatabaseError::UniqueViolation(format!(
                "wallet {} already holds {}",
                wallet_id, symbol
            ))
            .into());
        }

        let holding = self
            .store
            .commit(LedgerWriteBatch::new(new_holding.into_holding(), None))
            .await?;
        debug!("Created holding {} ({} in {})", holding.id, symbol, wallet_id);

        self.event_sink.emit(DomainEvent::HoldingCreated {
            holding_id: holding.id.clone(),
            wallet_id,
            symbol,
        });
        Ok(holding)
    }

    fn get_holding(&self, holding_id: &str) -> Result<Holding> {
        self.store.get_holding(holding_id)
    }

    fn list_holdings(&self, wallet_id: Option<&str>) -> Result<Vec<Holding>> {
        self.store.list_holdings(wallet_id)
    }

    fn get_lots(&self, holding_id: &str, open_only: bool) -> Result<Vec<Lot>> {
        // Unknown holdings are an error, not an empty list.
        self.store.get_holding(holding_id)?;
        if open_only {
            self.store.get_open_lots(holding_id)
        } else {
            self.store.get_lots(holding_id)
        }
    }

    async fn set_manual_price(&self, holding_id: &str, price: i64) -> Result<Holding> {
        if price < 0 {
            return Err(ValidationError::InvalidInput(format!(
                "Price cannot be negative, got {}",
                price
            ))
            .into());
        }
        let holding = self.store.get_holding(holding_id)?;
        if !holding.is_manual() {
            return Err(ValidationError::InvalidInput(format!(
                "Holding {} ({}) is priced by the market",
                holding.id, holding.symbol
            ))
            .into());
        }

        let updated = commit_price(
            self.store.as_ref(),
            &self.locks,
            holding_id,
            price,
            Utc::now(),
            self.config.max_commit_attempts,
        )
        .await?;
        self.event_sink
            .emit(DomainEvent::valuations_changed(vec![updated.id.clone()]));
        Ok(updated)
    }

    fn get_portfolio_summary(&self, wallet_id: &str) -> Result<PortfolioSummary> {
        let holdings = self.store.list_holdings(Some(wallet_id))?;

        let mut total_value = 0_i64;
        let mut total_cost = 0_i64;
        let mut unrealized_pnl = 0_i64;
        let mut realized_pnl = 0_i64;
        for holding in &holdings {
            total_value = checked_add(total_value, holding.current_value, "portfolio value")?;
            total_cost = checked_add(total_cost, holding.total_cost, "portfolio cost")?;
            unrealized_pnl =
                checked_add(unrealized_pnl, holding.unrealized_pnl, "portfolio unrealized pnl")?;
            realized_pnl =
                checked_add(realized_pnl, holding.realized_pnl, "portfolio realized pnl")?;
        }

        Ok(PortfolioSummary {
            wallet_id: wallet_id.to_string(),
            holding_count: holdings.len(),
            total_value,
            total_cost,
            unrealized_pnl,
            unrealized_pnl_percent: percent_of(unrealized_pnl, total_cost),
            realized_pnl,
        })
    }

    fn verify_holding(&self, holding_id: &str) -> Result<ConsistencyReport> {
        let holding = self.store.get_holding(holding_id)?;
        let lots = self.store.get_lots(holding_id)?;
        let transactions = self.store.list_transactions(holding_id)?;
        check_consistency(&holding, &lots, &transactions)
    }
}
