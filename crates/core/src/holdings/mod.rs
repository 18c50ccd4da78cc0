//! Holdings module - the per-wallet, per-symbol aggregate and its service.

pub mod holdings_aggregate;
mod holdings_model;
mod holdings_service;
mod holdings_traits;

#[cfg(test)]
mod holdings_service_tests;

pub use holdings_model::{
    AssetClass, ConsistencyReport, Holding, HoldingRef, NewHolding, PortfolioSummary, PricingMode,
};
pub(crate) use holdings_service::commit_price;
pub use holdings_service::HoldingService;
pub use holdings_traits::HoldingServiceTrait;
