//! Price provider trait definition.
//!
//! This module defines the `PriceProvider` trait that every latest-price
//! source implements. Caching and TTL policy live behind the trait.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{PriceRequest, Quote};

/// Trait for latest-price sources.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use holdfolio_market_data::{MarketDataError, PriceProvider, PriceRequest, Quote};
///
/// struct FixedProvider;
///
/// #[async_trait]
/// impl PriceProvider for FixedProvider {
///     fn id(&self) -> &'static str {
///         "FIXED"
///     }
///
///     async fn fetch_price(&self, request: &PriceRequest) -> Result<Quote, MarketDataError> {
///         // ...
///     }
/// }
/// ```
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Unique identifier for this provider, used for logging.
    fn id(&self) -> &'static str;

    /// Fetch the latest price for a symbol.
    ///
    /// Implementations may answer from a cache when the cached quote is
    /// younger than `request.max_age`. Callers impose their own timeout;
    /// a dropped future must not leave partial state behind.
    async fn fetch_price(&self, request: &PriceRequest) -> Result<Quote, MarketDataError>;
}
