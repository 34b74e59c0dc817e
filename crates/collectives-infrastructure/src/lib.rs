//! # Collectives Infrastructure
//!
//! PostgreSQL adapters for the repository ports and the HTTP client of the
//! federation membership registry.

pub mod database;
pub mod oracle;

pub use database::{
    create_pool, run_migrations, PgCatalogRepository, PgEventRepository, PgUnitOfWork, PgUserRepository,
};
pub use oracle::HttpMembershipOracle;
