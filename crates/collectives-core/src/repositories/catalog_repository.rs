//! Reference data lookups used when building events

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ActivityType, EventType, Role, User};
use crate::error::DomainError;

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_event_type(&self, id: &Uuid) -> Result<Option<EventType>, DomainError>;
    async fn find_activity_types(&self, ids: &[Uuid]) -> Result<Vec<ActivityType>, DomainError>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError>;
    async fn roles_of_users(&self, ids: &[Uuid]) -> Result<Vec<Role>, DomainError>;
}
