//! Core types for Prizey.
//!
//! This module provides type-safe wrappers for the tracked-product domain.

pub mod asin;
pub mod email;
pub mod id;
pub mod price;
pub mod source;

pub use asin::{Asin, AsinError};
pub use email::{Email, EmailError};
pub use id::*;
pub use price::{CurrencyCode, Price, RawPrice, UnknownCurrency};
pub use source::{PriceSource, UnknownPriceSource};
