//! # Collectives Shared
//! 
//! Configuration, telemetry, pagination types and constants shared by the
//! collectives crates.

pub mod constants;
pub mod types;
pub mod telemetry;
pub mod config;
pub mod error;

pub use types::*;
pub use config::{AppConfig, ClubSettings, OracleSettings};
pub use error::AppError;
