pub mod valuation_model;
pub mod valuation_service;

#[cfg(test)]
mod valuation_service_tests;

pub use valuation_model::*;
pub use valuation_service::ValuationService;
pub use valuation_service::ValuationServiceTrait;
