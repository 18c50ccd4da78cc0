//! Holdfolio Core - lot-based cost basis engine for investment holdings.
//!
//! This crate contains the domain models, the FIFO cost basis engine and
//! the services that record transactions, manage holdings and refresh
//! valuations. It is storage-agnostic: persistence sits behind
//! [`storage::LedgerStoreTrait`], cash behind [`wallets::WalletBalanceTrait`]
//! and prices behind `holdfolio_market_data::PriceProvider`.

pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod holdings;
pub mod lots;
pub mod storage;
pub mod transactions;
pub mod utils;
pub mod valuation;
pub mod wallets;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
