//! Event read side (port)

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Event, Registration};
use crate::error::DomainError;
use crate::listing::{EventQuery, UserEventQuery};

/// An event together with one registration of the listed user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEventRow {
    pub event: Event,
    pub registration: Registration,
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Event>, DomainError>;

    /// One page of events matching `query`, with the total match count.
    async fn list(&self, query: &EventQuery) -> Result<(Vec<Event>, u64), DomainError>;

    /// Events joined with the registrations of `user_id`.
    async fn list_for_user(
        &self,
        user_id: &Uuid,
        query: &UserEventQuery,
    ) -> Result<(Vec<UserEventRow>, u64), DomainError>;
}
