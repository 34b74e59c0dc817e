// ============================================================================
// Collectives Core - Caller Service
// File: crates/collectives-core/src/services/caller_service.rs
// ============================================================================
//! Builds the per-request [`Caller`] from an authenticated user id.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::catalog::{Caller, Capabilities};
use crate::error::DomainError;
use crate::repositories::UserRepository;

pub struct CallerService<R: UserRepository + ?Sized> {
    user_repo: Arc<R>,
}

impl<R: UserRepository + ?Sized> CallerService<R> {
    pub fn new(user_repo: Arc<R>) -> Self {
        Self { user_repo }
    }

    /// `None` is an anonymous caller. A token naming an unknown user is not
    /// an authentication at all.
    pub async fn resolve(&self, user_id: Option<Uuid>, now: NaiveDateTime) -> Result<Caller, DomainError> {
        let Some(user_id) = user_id else {
            return Ok(Caller::Anonymous);
        };

        let user = self.user_repo.find_by_id(&user_id).await?.ok_or_else(|| {
            warn!(user_id = %user_id, "token subject does not exist");
            DomainError::NotAuthenticated
        })?;
        let roles = self.user_repo.roles(&user_id).await?;
        let caps = Capabilities::resolve(&user, &roles, now);
        debug!(user_id = %user_id, roles = caps.roles_of().len(), "caller resolved");
        Ok(Caller::Member(caps))
    }
}
