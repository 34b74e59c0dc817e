//! User repository trait (port)

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Badge, Role, User};
use crate::error::DomainError;
use crate::listing::{BadgeQuery, badges::BadgeRow};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DomainError>;
    async fn roles(&self, user_id: &Uuid) -> Result<Vec<Role>, DomainError>;
    async fn badges(&self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError>;
    /// One page of badges matching `query`, with the total match count.
    async fn list_badges(&self, query: &BadgeQuery) -> Result<(Vec<BadgeRow>, u64), DomainError>;
}
