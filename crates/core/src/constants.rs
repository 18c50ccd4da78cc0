/// Minor units per major currency unit, as a power of ten (cents).
pub const CURRENCY_MINOR_UNITS: u32 = 2;

/// Quantity precision (decimal places) for equities, funds and bonds
pub const EQUITY_QUANTITY_DECIMALS: u32 = 4;

/// Quantity precision (decimal places) for crypto assets
pub const CRYPTO_QUANTITY_DECIMALS: u32 = 8;

/// Decimal precision for percentages
pub const PERCENT_DECIMAL_PRECISION: u32 = 2;

/// Commit attempts before a write conflict is surfaced to the caller
pub const DEFAULT_MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Concurrent price fetches during a valuation refresh
pub const DEFAULT_REFRESH_CONCURRENCY: usize = 4;

/// Per-fetch timeout during a valuation refresh, in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Staleness budget for cached prices, in seconds
pub const DEFAULT_PRICE_MAX_AGE_SECS: i64 = 900;
