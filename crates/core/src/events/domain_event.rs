//! Domain event types.

use serde::{Deserialize, Serialize};

/// Domain events emitted by core services after successful mutations.
///
/// These events represent facts about committed data. Runtime adapters
/// translate them into platform-specific actions (UI refresh, sync, etc.).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A holding was created, explicitly or by its first BUY.
    HoldingCreated {
        holding_id: String,
        wallet_id: String,
        symbol: String,
    },

    /// Transactions were recorded, edited, or reversed.
    TransactionsChanged {
        wallet_id: String,
        holding_id: String,
        transaction_ids: Vec<String>,
    },

    /// Prices and valuations of holdings were updated.
    HoldingValuationsChanged { holding_ids: Vec<String> },
}

impl DomainEvent {
    pub fn transactions_changed(
        wallet_id: impl Into<String>,
        holding_id: impl Into<String>,
        transaction_ids: Vec<String>,
    ) -> Self {
        DomainEvent::TransactionsChanged {
            wallet_id: wallet_id.into(),
            holding_id: holding_id.into(),
            transaction_ids,
        }
    }

    pub fn valuations_changed(holding_ids: Vec<String>) -> Self {
        DomainEvent::HoldingValuationsChanged { holding_ids }
    }
}
