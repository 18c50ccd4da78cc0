//! Core error types for the holdings engine.
//!
//! This module defines storage-agnostic error types. Store implementations
//! convert their own failures into [`DatabaseError`].

use thiserror::Error;

use holdfolio_market_data::MarketDataError;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type for the holdings engine.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Input validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Cost basis operation failed: {0}")]
    CostBasis(#[from] CostBasisError),

    #[error("Wallet balance adjustment failed: {0}")]
    Wallet(#[from] WalletError),

    #[error("Market data operation failed: {0}")]
    MarketData(#[from] MarketDataError),

    #[error("Invalid configuration value: {0}")]
    InvalidConfigValue(String),
}

impl Error {
    /// True for a missing holding, lot or transaction.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Database(DatabaseError::NotFound(_)))
    }

    /// True when the request clashes with later ledger activity.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::CostBasis(CostBasisError::Conflict(_)))
    }

    /// True when a commit lost an optimistic concurrency race and the whole
    /// read-plan-commit cycle may be retried.
    pub fn is_write_race(&self) -> bool {
        matches!(
            self,
            Error::Database(DatabaseError::VersionConflict { .. })
                | Error::Database(DatabaseError::UniqueViolation(_))
        )
    }
}

/// Storage-agnostic error type for store operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., second holding for a wallet+symbol).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// The holding changed between read and commit.
    #[error("Holding {holding_id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        holding_id: String,
        expected: i64,
        actual: i64,
    },

    /// A write batch could not be applied.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Internal/unexpected store error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Errors raised by the cost basis engine.
#[derive(Error, Debug)]
pub enum CostBasisError {
    #[error("Insufficient quantity in holding {holding_id}: requested {requested}, available {available} (short by {shortfall})")]
    InsufficientQuantity {
        holding_id: String,
        requested: i64,
        available: i64,
        shortfall: i64,
    },

    /// The aggregate reports quantity but the lot store has no open lot.
    #[error("No open lots for holding {holding_id}")]
    NoOpenLots { holding_id: String },

    /// Open lots exist but cover less than the aggregate quantity.
    #[error("Open lots of holding {holding_id} cover {open_quantity} but {requested} was requested")]
    LotShortfall {
        holding_id: String,
        requested: i64,
        open_quantity: i64,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(String),

    #[error("Lot {lot_id} is inconsistent: {reason}")]
    CorruptLot { lot_id: String, reason: String },
}

impl CostBasisError {
    /// Errors that mean the aggregate and the lot store disagree, as opposed
    /// to a user mistake.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            CostBasisError::NoOpenLots { .. }
                | CostBasisError::LotShortfall { .. }
                | CostBasisError::CorruptLot { .. }
        )
    }
}

/// Failures reported by the wallet balance collaborator.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Wallet {0} not found")]
    NotFound(String),

    #[error("Wallet {wallet_id} has insufficient funds: balance {balance}, adjustment {delta}")]
    InsufficientFunds {
        wallet_id: String,
        balance: i64,
        delta: i64,
    },

    #[error("Wallet service unavailable: {0}")]
    Unavailable(String),
}

/// Validation errors for user input and configuration.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Required field '{0}' is missing")]
    MissingField(String),
}

// === From implementations for common error types ===

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Validation(ValidationError::InvalidInput(err.to_string()))
    }
}
