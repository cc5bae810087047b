//! Shared types, errors, and configuration for Settla.
//!
//! This crate holds everything the other crates agree on: typed IDs,
//! the minor-unit money codec, the application error taxonomy, and
//! configuration loading.

pub mod config;
pub mod error;
pub mod types;

pub use config::{AppConfig, DatabaseConfig, ProviderConfig, SettlementConfig};
pub use error::{AppError, AppResult};
