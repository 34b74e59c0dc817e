//! Application services: one atomic boundary per command

pub mod caller_service;
pub mod event_service;
pub mod listing_service;
pub mod registration_service;

pub use caller_service::CallerService;
pub use event_service::{EventDraft, EventService};
pub use listing_service::ListingService;
pub use registration_service::RegistrationService;
