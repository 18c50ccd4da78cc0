use async_trait::async_trait;

use super::holdings_model::{ConsistencyReport, Holding, NewHolding, PortfolioSummary};
use crate::errors::Result;
use crate::lots::Lot;

/// Trait defining the contract for holding operations.
#[async_trait]
pub trait HoldingServiceTrait: Send + Sync {
    /// Creates an empty holding. Wallet + symbol must be unique.
    async fn create_holding(&self, new_holding: NewHolding) -> Result<Holding>;

    fn get_holding(&self, holding_id: &str) -> Result<Holding>;

    /// Lists holdings, optionally restricted to one wallet.
    fn list_holdings(&self, wallet_id: Option<&str>) -> Result<Vec<Holding>>;

    /// Lots of a holding in FIFO order.
    fn get_lots(&self, holding_id: &str, open_only: bool) -> Result<Vec<Lot>>;

    /// Sets the price of a manually priced holding. Zero is accepted.
    async fn set_manual_price(&self, holding_id: &str, price: i64) -> Result<Holding>;

    fn get_portfolio_summary(&self, wallet_id: &str) -> Result<PortfolioSummary>;

    /// Recomputes the aggregate from lots and the ledger and reports drift.
    fn verify_holding(&self, holding_id: &str) -> Result<ConsistencyReport>;
}
