//! HTTP handlers

pub mod events;
pub mod health;
pub mod listings;
pub mod registrations;
