//! # Collectives Security
//!
//! Bearer tokens identifying the member behind a request.

pub mod jwt;

pub use jwt::{Claims, JwtError, JwtService};
