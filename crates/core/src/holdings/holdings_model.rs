use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{CRYPTO_QUANTITY_DECIMALS, EQUITY_QUANTITY_DECIMALS};
use crate::errors::{Result, ValidationError};

/// Asset class of a holding. Decides the quantity precision factor.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    #[default]
    Stock,
    Etf,
    MutualFund,
    Bond,
    Crypto,
    Other,
}

impl AssetClass {
    /// Decimal places carried by scaled quantities of this class.
    pub fn quantity_decimals(&self) -> u32 {
        match self {
            AssetClass::Crypto => CRYPTO_QUANTITY_DECIMALS,
            AssetClass::Stock
            | AssetClass::Etf
            | AssetClass::MutualFund
            | AssetClass::Bond
            | AssetClass::Other => EQUITY_QUANTITY_DECIMALS,
        }
    }
}

/// Where the current price of a holding comes from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingMode {
    /// Refreshed from the market data provider.
    #[default]
    Market,
    /// Set by the user; never touched by the valuation refresher.
    Manual,
}

/// Per-wallet, per-symbol position summary.
///
/// `total_cost` and `average_cost` are cumulative over every buy ever made,
/// including lots that have since been sold. Sells never write them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub id: String,
    pub wallet_id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub currency: String,
    pub asset_class: AssetClass,
    pub pricing_mode: PricingMode,

    /// Scaled by `asset_class.quantity_decimals()`.
    pub quantity: i64,
    pub average_cost: i64,
    pub total_cost: i64,

    pub current_price: Option<i64>,
    pub current_value: i64,
    pub unrealized_pnl: i64,
    pub unrealized_pnl_percent: Decimal,
    pub realized_pnl: i64,
    pub price_updated_at: Option<DateTime<Utc>>,

    /// Bumped by the store on every committed write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    pub fn quantity_decimals(&self) -> u32 {
        self.asset_class.quantity_decimals()
    }

    pub fn is_manual(&self) -> bool {
        self.pricing_mode == PricingMode::Manual
    }
}

/// Input model for creating a holding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewHolding {
    pub wallet_id: String,
    pub symbol: String,
    pub name: Option<String>,
    pub currency: String,
    #[serde(default)]
    pub asset_class: AssetClass,
    #[serde(default)]
    pub pricing_mode: PricingMode,
}

impl NewHolding {
    pub fn validate(&self) -> Result<()> {
        if self.wallet_id.trim().is_empty() {
            return Err(ValidationError::MissingField("walletId".to_string()).into());
        }
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::MissingField("symbol".to_string()).into());
        }
        if self.currency.trim().is_empty() {
            return Err(ValidationError::MissingField("currency".to_string()).into());
        }
        Ok(())
    }

    /// Symbols are matched case-insensitively; they are stored upper-cased.
    pub fn normalized_symbol(&self) -> String {
        self.symbol.trim().to_uppercase()
    }

    /// Builds an empty, not yet persisted holding (`version` 0).
    pub fn into_holding(self) -> Holding {
        let now = Utc::now();
        Holding {
            id: Uuid::now_v7().to_string(),
            symbol: self.normalized_symbol(),
            wallet_id: self.wallet_id.trim().to_string(),
            name: self.name,
            currency: self.currency.trim().to_uppercase(),
            asset_class: self.asset_class,
            pricing_mode: self.pricing_mode,
            quantity: 0,
            average_cost: 0,
            total_cost: 0,
            current_price: None,
            current_value: 0,
            unrealized_pnl: 0,
            unrealized_pnl_percent: Decimal::ZERO,
            realized_pnl: 0,
            price_updated_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How a transaction names its holding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HoldingRef {
    /// An existing holding.
    Id { holding_id: String },
    /// Wallet + symbol; a BUY creates the holding if it does not exist yet.
    Symbol(NewHolding),
}

/// Totals across the holdings of one wallet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub wallet_id: String,
    pub holding_count: usize,
    pub total_value: i64,
    pub total_cost: i64,
    pub unrealized_pnl: i64,
    pub unrealized_pnl_percent: Decimal,
    pub realized_pnl: i64,
}

/// Differences between the stored aggregate and the one derived from lots.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub holding_id: String,
    pub drift: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_empty()
    }
}
