//! Common types used across the application.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{Currency, Money, MoneyError, from_minor_units, is_valid_amount, to_minor_units};
