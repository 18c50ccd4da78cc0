//! Transactions module - ledger models, the cost basis engine, and the
//! transaction service.

pub mod cost_basis_engine;
mod transactions_model;
mod transactions_service;
mod transactions_traits;


pub use cost_basis_engine::{CostBasisEngine, PlannedWrite, TransactionMeta};
pub use transactions_model::{
    LedgerEntry, NewTransaction, ReversalReason, TradeRequest, Transaction, TransactionStatus,
    TransactionType, TransactionUpdate,
};
pub use transactions_service::TransactionService;
pub use transactions_traits::TransactionServiceTrait;
