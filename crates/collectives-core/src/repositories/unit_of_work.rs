//! Transactional port used by every state-changing command
//!
//! A command opens one [`Transaction`], locks the event row before reading
//! slot counts, and commits once. Dropping a transaction without committing
//! rolls it back.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::domain::{Badge, Event, Registration, RegistrationStatus, Role, User};
use crate::error::DomainError;

#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError>;
}

#[async_trait]
pub trait Transaction: Send {
    /// Reads the event and holds an exclusive lock on it until the end of the transaction.
    async fn lock_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError>;
    async fn find_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError>;
    async fn insert_event(&mut self, event: &Event) -> Result<(), DomainError>;
    async fn update_event(&mut self, event: &Event) -> Result<(), DomainError>;

    /// Reads the user and holds an exclusive lock on it until the end of the transaction.
    async fn lock_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError>;
    async fn find_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError>;
    async fn update_license_expiry(&mut self, user_id: &Uuid, expiry: NaiveDate) -> Result<(), DomainError>;
    async fn user_roles(&mut self, user_id: &Uuid) -> Result<Vec<Role>, DomainError>;

    async fn find_registration(&mut self, id: &Uuid) -> Result<Option<Registration>, DomainError>;
    async fn event_registrations(&mut self, event_id: &Uuid) -> Result<Vec<Registration>, DomainError>;
    async fn user_registrations_with_status(
        &mut self,
        user_id: &Uuid,
        status: RegistrationStatus,
    ) -> Result<Vec<Registration>, DomainError>;
    /// Registrations of `user_id` holding a slot on another confirmed event
    /// whose type requires an activity and which overlaps `[start, end]`.
    /// Waiting-list rows are included when `include_waiting` is set.
    async fn registrations_during(
        &mut self,
        user_id: &Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluded_event_id: &Uuid,
        include_waiting: bool,
    ) -> Result<Vec<Registration>, DomainError>;
    /// `PaymentPending` registrations whose `registration_time` is before `cutoff`.
    async fn stale_payment_registrations(
        &mut self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Registration>, DomainError>;
    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), DomainError>;
    async fn update_registration(&mut self, registration: &Registration) -> Result<(), DomainError>;
    async fn delete_registration(&mut self, id: &Uuid) -> Result<(), DomainError>;

    async fn user_badges(&mut self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError>;
    async fn insert_badge(&mut self, badge: &Badge) -> Result<(), DomainError>;
    async fn delete_badge(&mut self, id: &Uuid) -> Result<(), DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
