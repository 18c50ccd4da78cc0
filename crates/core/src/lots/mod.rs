//! Lots module - purchase lots and FIFO consumption.

pub mod fifo;
mod lots_model;

pub use fifo::{
    consume_allocations, plan_fifo_sale, restore_allocations, sort_fifo, FifoSalePlan,
};
pub use lots_model::{Lot, LotAllocation};

#[cfg(test)]
mod fifo_tests;
