//! # Collectives Core - Domain Module
//! 
//! Entities of the event access and registration core.

pub mod activity;
pub mod badge;
pub mod event;
pub mod federation;
pub mod registration;
pub mod role;
pub mod user;

pub use activity::{ActivityKind, ActivityType, EventType};
pub use badge::{
    ActivityRequirement, Badge, BadgeCategory, BadgeDescriptor, BadgeKind, ExpiryPolicy, LevelScale,
};
pub use event::{Event, EventStatus, EventVisibility, LeaderRef};
pub use federation::federation_year_end;
pub use registration::{Absence, Registration, RegistrationLevel, RegistrationStatus};
pub use role::{Role, RoleKind};
pub use user::{User, UserType};
