//! Market data provider abstractions.
//!
//! The core system doesn't know about specific providers; it only talks to
//! [`PriceProvider`].

mod traits;

pub use traits::PriceProvider;
