use async_trait::async_trait;

use crate::errors::Result;

/// Contract of the external wallet-balance ledger.
///
/// The engine makes exactly one call per operation with the net signed
/// amount: negative debits the wallet (a buy), positive credits it (a sell
/// or a reversed buy).
#[async_trait]
pub trait WalletBalanceTrait: Send + Sync {
    /// Adjusts the wallet's cash balance by `delta` smallest currency units
    /// and returns the new balance. Failures are reported as
    /// [`crate::errors::WalletError`].
    async fn adjust_balance(&self, wallet_id: &str, delta: i64) -> Result<i64>;
}
