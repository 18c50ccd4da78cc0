use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A holding whose price could not be refreshed. It keeps its last
/// committed price and valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaleValuation {
    /// `None` when the holding was never priced.
    pub last_known_price: Option<i64>,
    pub reason: String,
    /// Worth retrying later (timeouts, rate limits, lost write races).
    pub transient: bool,
}

/// Outcome of one refresh batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuationRefreshReport {
    /// Holding id -> newly committed price, smallest currency unit.
    pub prices: HashMap<String, i64>,
    pub stale: HashMap<String, StaleValuation>,
    /// Manually priced holdings, left untouched.
    pub skipped: Vec<String>,
}

impl ValuationRefreshReport {
    pub fn is_complete(&self) -> bool {
        self.stale.is_empty()
    }
}
