//! PostgreSQL repository implementations

mod predicate_sql;
mod rows;

pub mod catalog_repo_impl;
pub mod event_repo_impl;
pub mod unit_of_work_impl;
pub mod user_repo_impl;

pub use catalog_repo_impl::PgCatalogRepository;
pub use event_repo_impl::PgEventRepository;
pub use unit_of_work_impl::PgUnitOfWork;
pub use user_repo_impl::PgUserRepository;
