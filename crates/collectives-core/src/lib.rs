//! # Collectives Core
//!
//! Event access control and registration lifecycle of the club: domain
//! entities, the access evaluator, the visibility filter, the registration
//! state machine with its waiting-list promoter, the sanction engine, the
//! listing contract, repository ports and the services running commands.

pub mod access;
pub mod capacity;
pub mod catalog;
pub mod context;
pub mod domain;
pub mod error;
pub mod listing;
pub mod oracle;
pub mod predicate;
pub mod promoter;
pub mod repositories;
pub mod sanctions;
pub mod services;
pub mod visibility;

#[cfg(feature = "test-utils")]
pub mod memory;

// Re-export domain entities
pub use catalog::{ActivityScope, Caller, Capabilities};
pub use context::{Clock, RequestContext, SystemClock};
pub use domain::*;
pub use error::DomainError;

#[cfg(any(test, feature = "test-utils"))]
pub use context::FixedClock;
