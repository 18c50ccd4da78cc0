use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, ValidationError};
use crate::utils::scaled_math::{checked_add, per_unit_amount, scaled_amount};

/// A discrete purchase batch inside a holding.
///
/// Only `remaining_quantity` ever changes after creation, and only through
/// the cost basis engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: String,
    pub holding_id: String,
    /// Original size of the lot, scaled by the holding's quantity precision.
    pub quantity: i64,
    pub remaining_quantity: i64,
    /// Per-unit cost of this lot including its share of fees, smallest currency unit.
    pub average_cost: i64,
    /// `quantity × price + fees` at purchase, smallest currency unit.
    pub total_cost: i64,
    /// FIFO ordering key.
    pub purchased_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// Builds the lot recorded by a BUY.
    pub fn from_purchase(
        holding_id: &str,
        quantity: i64,
        quantity_decimals: u32,
        price: i64,
        fees: i64,
        purchased_at: DateTime<Utc>,
    ) -> Result<Self> {
        if quantity <= 0 {
            return Err(ValidationError::InvalidInput(format!(
                "Lot quantity must be positive, got {}",
                quantity
            ))
            .into());
        }
        let gross = scaled_amount(quantity, quantity_decimals, price, "lot gross cost")?;
        let total_cost = checked_add(gross, fees, "lot total cost")?;
        let average_cost =
            per_unit_amount(total_cost, quantity, quantity_decimals, "lot average cost")?;

        Ok(Lot {
            id: Uuid::now_v7().to_string(),
            holding_id: holding_id.to_string(),
            quantity,
            remaining_quantity: quantity,
            average_cost,
            total_cost,
            purchased_at,
            created_at: Utc::now(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.remaining_quantity > 0
    }

    /// True while no sell has drawn from the lot.
    pub fn is_untouched(&self) -> bool {
        self.remaining_quantity == self.quantity
    }

    pub fn consumed_quantity(&self) -> i64 {
        self.quantity - self.remaining_quantity
    }
}

/// The part of a SELL drawn from one lot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LotAllocation {
    pub lot_id: String,
    /// Quantity taken from the lot, scaled.
    pub quantity: i64,
    /// `lot.average_cost × quantity`
    pub cost_basis: i64,
    /// `sale price × quantity`
    pub proceeds: i64,
}

impl LotAllocation {
    pub fn pnl(&self) -> i64 {
        self.proceeds - self.cost_basis
    }
}
