//! Holdfolio Market Data Crate
//!
//! Provider-agnostic latest-price fetching for the holdings engine.
//!
//! # Core Types
//!
//! - [`PriceProvider`] - Trait implemented by every price source
//! - [`PriceRequest`] - Symbol, currency and staleness budget for a lookup
//! - [`Quote`] - Latest price returned by a provider
//! - [`MarketDataError`] - Provider failures, classified by [`RetryClass`]

pub mod errors;
pub mod models;
pub mod provider;

pub use errors::{MarketDataError, RetryClass};
pub use models::{PriceRequest, Quote};
pub use provider::PriceProvider;
