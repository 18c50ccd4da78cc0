use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, ValidationError};
use crate::holdings::HoldingRef;
use crate::lots::LotAllocation;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    #[default]
    Active,
    /// A reversal entry cancelled this transaction's effects.
    Reversed,
}

/// A BUY or SELL recorded in the ledger.
///
/// The cost basis effects of a transaction are never edited in place;
/// deleting or editing appends a [`LedgerEntry::ReversalOf`] and flips
/// `status` to `Reversed`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    /// Ledger position; later commits get larger numbers.
    pub sequence: u64,
    pub holding_id: String,
    pub wallet_id: String,
    pub transaction_type: TransactionType,
    /// Scaled by the holding's quantity precision.
    pub quantity: i64,
    /// Per whole unit, smallest currency unit.
    pub price: i64,
    pub fees: i64,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
    /// The lot created by a BUY, or the single lot drawn by a SELL.
    pub lot_id: Option<String>,
    /// Every lot a SELL drew from, in FIFO order. Empty for BUY.
    #[serde(default)]
    pub lot_allocations: Vec<LotAllocation>,
    /// Realized PNL delta of a SELL. Zero for BUY.
    pub realized_pnl: i64,
    /// Holding quantity right after this transaction.
    pub remaining_quantity: i64,
    /// Signed wallet adjustment made by this transaction.
    pub cash_delta: i64,
    pub status: TransactionStatus,
    pub reversed_by: Option<String>,
    /// Transaction this one replaced through an edit.
    pub supersedes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }
}

/// The economic parameters of a BUY or SELL.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub transaction_type: TransactionType,
    pub quantity: i64,
    pub price: i64,
    #[serde(default)]
    pub fees: i64,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TradeRequest {
    /// Rejects malformed input before anything is read or written.
    pub fn validate(&self) -> Result<()> {
        if self.quantity <= 0 {
            return Err(ValidationError::InvalidInput(format!(
                "Quantity must be positive, got {}",
                self.quantity
            ))
            .into());
        }
        if self.price < 0 {
            return Err(ValidationError::InvalidInput(format!(
                "Price cannot be negative, got {}",
                self.price
            ))
            .into());
        }
        if self.fees < 0 {
            return Err(ValidationError::InvalidInput(format!(
                "Fees cannot be negative, got {}",
                self.fees
            ))
            .into());
        }
        Ok(())
    }
}

/// Input model for recording a transaction.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub holding: HoldingRef,
    #[serde(flatten)]
    pub trade: TradeRequest,
}

/// Replacement parameters for an existing transaction. The type is kept.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    pub quantity: i64,
    pub price: i64,
    #[serde(default)]
    pub fees: i64,
    pub transaction_date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TransactionUpdate {
    pub fn into_trade(self, transaction_type: TransactionType) -> TradeRequest {
        TradeRequest {
            transaction_type,
            quantity: self.quantity,
            price: self.price,
            fees: self.fees,
            transaction_date: self.transaction_date,
            notes: self.notes,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum ReversalReason {
    Deleted,
    Edited { replacement_id: String },
}

/// Append-only ledger record.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerEntry {
    /// A transaction's effects were applied.
    #[serde(rename_all = "camelCase")]
    Applied {
        id: String,
        sequence: u64,
        holding_id: String,
        transaction_id: String,
        cash_delta: i64,
        recorded_at: DateTime<Utc>,
    },
    /// A transaction's effects were undone.
    #[serde(rename_all = "camelCase")]
    ReversalOf {
        id: String,
        sequence: u64,
        holding_id: String,
        original_id: String,
        reason: ReversalReason,
        cash_delta: i64,
        recorded_at: DateTime<Utc>,
    },
}

impl LedgerEntry {
    pub fn applied(transaction: &Transaction, recorded_at: DateTime<Utc>) -> Self {
        LedgerEntry::Applied {
            id: Uuid::now_v7().to_string(),
            sequence: transaction.sequence,
            holding_id: transaction.holding_id.clone(),
            transaction_id: transaction.id.clone(),
            cash_delta: transaction.cash_delta,
            recorded_at,
        }
    }

    pub fn reversal(
        original: &Transaction,
        sequence: u64,
        reason: ReversalReason,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        LedgerEntry::ReversalOf {
            id: Uuid::now_v7().to_string(),
            sequence,
            holding_id: original.holding_id.clone(),
            original_id: original.id.clone(),
            reason,
            cash_delta: -original.cash_delta,
            recorded_at,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            LedgerEntry::Applied { id, .. } | LedgerEntry::ReversalOf { id, .. } => id,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            LedgerEntry::Applied { sequence, .. } | LedgerEntry::ReversalOf { sequence, .. } => {
                *sequence
            }
        }
    }

    pub fn holding_id(&self) -> &str {
        match self {
            LedgerEntry::Applied { holding_id, .. }
            | LedgerEntry::ReversalOf { holding_id, .. } => holding_id,
        }
    }
}
