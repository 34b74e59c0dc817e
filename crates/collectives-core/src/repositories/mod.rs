//! Repository traits (ports)

pub mod catalog_repository;
pub mod event_repository;
pub mod unit_of_work;
pub mod user_repository;

pub use catalog_repository::CatalogRepository;
pub use event_repository::{EventRepository, UserEventRow};
pub use unit_of_work::{Transaction, UnitOfWork};
pub use user_repository::UserRepository;
