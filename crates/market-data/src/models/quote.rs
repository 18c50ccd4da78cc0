use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters for a single latest-price lookup.
#[derive(Clone, Debug)]
pub struct PriceRequest {
    /// Ticker or provider symbol (e.g. "AAPL", "BTC")
    pub symbol: String,

    /// Currency the price should be quoted in
    pub currency: String,

    /// Staleness budget. A cached quote younger than this may be served
    /// without contacting the upstream. Zero forces a live fetch.
    pub max_age: Duration,
}

impl PriceRequest {
    pub fn new(symbol: impl Into<String>, currency: impl Into<String>, max_age: Duration) -> Self {
        Self {
            symbol: symbol.into(),
            currency: currency.into(),
            max_age,
        }
    }

    /// Request that bypasses any cache.
    pub fn forced(symbol: impl Into<String>, currency: impl Into<String>) -> Self {
        Self::new(symbol, currency, Duration::zero())
    }
}

/// Latest market price for a symbol
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,

    /// Timestamp of the quote
    pub timestamp: DateTime<Utc>,

    /// Current price in major currency units (e.g. 170.25)
    pub price: Decimal,

    /// Quote currency
    pub currency: String,

    /// Source of the quote (YAHOO, CACHE, etc.)
    pub source: String,
}

impl Quote {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        price: Decimal,
        currency: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            price,
            currency: currency.into(),
            source: source.into(),
        }
    }

    /// Age of the quote relative to `now`. Never negative.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        let age = now - self.timestamp;
        if age < Duration::zero() {
            Duration::zero()
        } else {
            age
        }
    }

    /// Whether the quote satisfies the given staleness budget.
    pub fn is_fresh(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) <= max_age
    }
}
