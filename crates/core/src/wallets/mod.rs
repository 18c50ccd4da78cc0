//! Wallets module - the cash balance collaborator.

mod wallets_traits;

pub use wallets_traits::WalletBalanceTrait;
