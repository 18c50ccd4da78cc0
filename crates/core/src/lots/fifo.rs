//! FIFO lot relief.
//!
//! A sale draws from open lots oldest first (`purchased_at`, then lot id).
//! Each draw is costed at the lot's own average cost, never at the
//! holding's blended average.

use log::{debug, error};

use super::lots_model::{Lot, LotAllocation};
use crate::errors::{CostBasisError, Result};
use crate::utils::scaled_math::{checked_add, checked_sub, scaled_amount};

/// Orders lots for FIFO consumption: oldest purchase first, lot id breaks ties.
pub fn sort_fifo(lots: &mut [Lot]) {
    lots.sort_by(|a, b| {
        a.purchased_at
            .cmp(&b.purchased_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Result of walking the open lots for one sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoSalePlan {
    pub allocations: Vec<LotAllocation>,
    /// Σ allocation cost basis
    pub cost_basis: i64,
    /// Σ allocation proceeds
    pub proceeds: i64,
    /// Σ allocation PNL minus the sale fees (charged once).
    pub realized_pnl: i64,
}

/// Plans the consumption of `quantity` from `lots`.
///
/// `lots` may be in any order and may contain closed lots; only open lots
/// take part. Nothing is mutated.
pub fn plan_fifo_sale(
    holding_id: &str,
    lots: &[Lot],
    quantity: i64,
    quantity_decimals: u32,
    price: i64,
    fees: i64,
) -> Result<FifoSalePlan> {
    let mut open_lots: Vec<Lot> = lots.iter().filter(|lot| lot.is_open()).cloned().collect();
    if open_lots.is_empty() {
        error!(
            "Holding {} has no open lots while selling {}. Aggregate and lot store disagree.",
            holding_id, quantity
        );
        return Err(CostBasisError::NoOpenLots {
            holding_id: holding_id.to_string(),
        }
        .into());
    }
    sort_fifo(&mut open_lots);

    let mut still_to_sell = quantity;
    let mut allocations = Vec::new();
    let mut cost_basis = 0_i64;
    let mut proceeds = 0_i64;
    let mut gross_pnl = 0_i64;

    for lot in &open_lots {
        if still_to_sell == 0 {
            break;
        }
        let consumed = lot.remaining_quantity.min(still_to_sell);
        let allocation = LotAllocation {
            lot_id: lot.id.clone(),
            quantity: consumed,
            cost_basis: scaled_amount(consumed, quantity_decimals, lot.average_cost, "cost basis")?,
            proceeds: scaled_amount(consumed, quantity_decimals, price, "sale proceeds")?,
        };
        debug!(
            "FIFO: lot {} gives {} of {} remaining (cost basis {}, proceeds {})",
            lot.id, consumed, lot.remaining_quantity, allocation.cost_basis, allocation.proceeds
        );

        cost_basis = checked_add(cost_basis, allocation.cost_basis, "cost basis")?;
        proceeds = checked_add(proceeds, allocation.proceeds, "sale proceeds")?;
        gross_pnl = checked_add(gross_pnl, allocation.pnl(), "realized pnl")?;
        still_to_sell -= consumed;
        allocations.push(allocation);
    }

    if still_to_sell > 0 {
        let open_quantity = quantity - still_to_sell;
        error!(
            "Open lots of holding {} cover only {} of the {} requested. Aggregate and lot store disagree.",
            holding_id, open_quantity, quantity
        );
        return Err(CostBasisError::LotShortfall {
            holding_id: holding_id.to_string(),
            requested: quantity,
            open_quantity,
        }
        .into());
    }

    Ok(FifoSalePlan {
        allocations,
        cost_basis,
        proceeds,
        realized_pnl: checked_sub(gross_pnl, fees, "realized pnl")?,
    })
}

/// Decrements `remaining_quantity` of every allocated lot.
pub fn consume_allocations(lots: &mut [Lot], allocations: &[LotAllocation]) -> Result<()> {
    for allocation in allocations {
        let lot = find_lot(lots, &allocation.lot_id)?;
        if allocation.quantity > lot.remaining_quantity {
            return Err(CostBasisError::CorruptLot {
                lot_id: lot.id.clone(),
                reason: format!(
                    "cannot consume {} from remaining {}",
                    allocation.quantity, lot.remaining_quantity
                ),
            }
            .into());
        }
        lot.remaining_quantity -= allocation.quantity;
    }
    Ok(())
}

/// Gives allocated quantity back to the lots, undoing [`consume_allocations`].
pub fn restore_allocations(lots: &mut [Lot], allocations: &[LotAllocation]) -> Result<()> {
    for allocation in allocations {
        let lot = find_lot(lots, &allocation.lot_id)?;
        let restored = lot.remaining_quantity + allocation.quantity;
        if restored > lot.quantity {
            return Err(CostBasisError::CorruptLot {
                lot_id: lot.id.clone(),
                reason: format!(
                    "restoring {} would exceed original quantity {}",
                    allocation.quantity, lot.quantity
                ),
            }
            .into());
        }
        lot.remaining_quantity = restored;
    }
    Ok(())
}

fn find_lot<'a>(lots: &'a mut [Lot], lot_id: &str) -> Result<&'a mut Lot> {
    lots.iter_mut()
        .find(|lot| lot.id == lot_id)
        .ok_or_else(|| {
            CostBasisError::CorruptLot {
                lot_id: lot_id.to_string(),
                reason: "lot referenced by a sale is missing".to_string(),
            }
            .into()
        })
}
