//! Holding aggregate maintenance.
//!
//! The aggregate is a cache over lot state plus the realized PNL of active
//! sells. Buy-side functions are the only writers of `total_cost` and
//! `average_cost`; sell-side functions touch quantity and realized PNL only.

use chrono::{DateTime, Utc};
use log::warn;
use rust_decimal::Decimal;

use super::holdings_model::{ConsistencyReport, Holding};
use crate::errors::{Result, ValidationError};
use crate::lots::Lot;
use crate::transactions::{Transaction, TransactionType};
use crate::utils::scaled_math::{
    checked_add, checked_sub, checked_sum, per_unit_amount, percent_of, scaled_amount,
};

/// Aggregate figures recomputed from lots and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAggregate {
    pub quantity: i64,
    pub total_cost: i64,
    pub average_cost: i64,
    pub realized_pnl: i64,
}

/// Σ original quantity over every lot, open or closed.
fn bought_quantity(lots: &[Lot]) -> Result<i64> {
    checked_sum(lots.iter().map(|lot| lot.quantity), "bought quantity")
}

/// Folds a freshly created lot into the aggregate.
///
/// `lots` is the holding's full lot set including `lot`; the average is the
/// weighted mean over every buy ever made.
pub fn apply_buy(holding: &mut Holding, lot: &Lot, lots: &[Lot]) -> Result<()> {
    holding.total_cost = checked_add(holding.total_cost, lot.total_cost, "holding total cost")?;
    holding.quantity = checked_add(holding.quantity, lot.quantity, "holding quantity")?;
    holding.average_cost = per_unit_amount(
        holding.total_cost,
        bought_quantity(lots)?,
        holding.quantity_decimals(),
        "holding average cost",
    )?;
    revalue(holding)
}

/// Removes a never-consumed lot's contribution. `remaining_lots` excludes it.
pub fn reverse_buy(holding: &mut Holding, lot: &Lot, remaining_lots: &[Lot]) -> Result<()> {
    holding.total_cost = checked_sub(holding.total_cost, lot.total_cost, "holding total cost")?;
    holding.quantity = checked_sub(holding.quantity, lot.quantity, "holding quantity")?;
    holding.average_cost = per_unit_amount(
        holding.total_cost,
        bought_quantity(remaining_lots)?,
        holding.quantity_decimals(),
        "holding average cost",
    )?;
    revalue(holding)
}

/// Records a sale. Cost basis fields stay bit-identical.
pub fn apply_sell(holding: &mut Holding, quantity: i64, realized_pnl: i64) -> Result<()> {
    holding.quantity = checked_sub(holding.quantity, quantity, "holding quantity")?;
    holding.realized_pnl = checked_add(holding.realized_pnl, realized_pnl, "realized pnl")?;
    revalue(holding)
}

/// Undoes [`apply_sell`].
pub fn reverse_sell(holding: &mut Holding, quantity: i64, realized_pnl: i64) -> Result<()> {
    holding.quantity = checked_add(holding.quantity, quantity, "holding quantity")?;
    holding.realized_pnl = checked_sub(holding.realized_pnl, realized_pnl, "realized pnl")?;
    revalue(holding)
}

/// Sets a new current price and recomputes the valuation fields.
///
/// Zero is a valid price; it clears the valuation to zero.
pub fn apply_price(holding: &mut Holding, price: i64, priced_at: DateTime<Utc>) -> Result<()> {
    if price < 0 {
        return Err(ValidationError::InvalidInput(format!(
            "Price cannot be negative, got {}",
            price
        ))
        .into());
    }
    holding.current_price = Some(price);
    holding.price_updated_at = Some(priced_at);
    revalue(holding)
}

/// Recomputes `current_value` and unrealized PNL from the current price.
///
/// Unrealized PNL is measured against the full historical `total_cost`,
/// not a quantity-proportional share of it.
pub fn revalue(holding: &mut Holding) -> Result<()> {
    match holding.current_price {
        Some(price) => {
            holding.current_value = scaled_amount(
                holding.quantity,
                holding.quantity_decimals(),
                price,
                "current value",
            )?;
            holding.unrealized_pnl =
                checked_sub(holding.current_value, holding.total_cost, "unrealized pnl")?;
            holding.unrealized_pnl_percent = percent_of(holding.unrealized_pnl, holding.total_cost);
        }
        None => {
            holding.current_value = 0;
            holding.unrealized_pnl = 0;
            holding.unrealized_pnl_percent = Decimal::ZERO;
        }
    }
    Ok(())
}

/// Recomputes the aggregate from lots and the active sells of the ledger.
pub fn derive_aggregate(
    lots: &[Lot],
    transactions: &[Transaction],
    quantity_decimals: u32,
) -> Result<DerivedAggregate> {
    let quantity = checked_sum(
        lots.iter().map(|lot| lot.remaining_quantity),
        "derived quantity",
    )?;
    let total_cost = checked_sum(lots.iter().map(|lot| lot.total_cost), "derived total cost")?;
    let realized_pnl = checked_sum(
        transactions
            .iter()
            .filter(|tx| tx.is_active() && tx.transaction_type == TransactionType::Sell)
            .map(|tx| tx.realized_pnl),
        "derived realized pnl",
    )?;
    let average_cost = per_unit_amount(
        total_cost,
        bought_quantity(lots)?,
        quantity_decimals,
        "derived average cost",
    )?;

    Ok(DerivedAggregate {
        quantity,
        total_cost,
        average_cost,
        realized_pnl,
    })
}

/// Compares the stored aggregate against [`derive_aggregate`].
pub fn check_consistency(
    holding: &Holding,
    lots: &[Lot],
    transactions: &[Transaction],
) -> Result<ConsistencyReport> {
    let derived = derive_aggregate(lots, transactions, holding.quantity_decimals())?;
    let mut drift = Vec::new();

    let fields = [
        ("quantity", holding.quantity, derived.quantity),
        ("totalCost", holding.total_cost, derived.total_cost),
        ("averageCost", holding.average_cost, derived.average_cost),
        ("realizedPnl", holding.realized_pnl, derived.realized_pnl),
    ];
    for (name, stored, expected) in fields {
        if stored != expected {
            drift.push(format!("{}: stored {}, derived {}", name, stored, expected));
        }
    }

    if !drift.is_empty() {
        warn!(
            "Holding {} aggregate drifted from its lots: {}",
            holding.id,
            drift.join("; ")
        );
    }

    Ok(ConsistencyReport {
        holding_id: holding.id.clone(),
        drift,
    })
}
