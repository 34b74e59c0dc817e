// ============================================================================
// Collectives Infrastructure - PostgreSQL Catalog Repository
// File: crates/collectives-infrastructure/src/database/postgres/catalog_repo_impl.rs
// Description: Reference data resolved while building events
// ============================================================================

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use collectives_core::domain::{ActivityType, EventType, Role, User};
use collectives_core::error::DomainError;
use collectives_core::repositories::CatalogRepository;

use super::rows::{convert_all, fetch_roles, fetch_users, ActivityTypeRow, EventTypeRow};
use crate::database::error::map_sqlx_error;

pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn find_event_type(&self, id: &Uuid) -> Result<Option<EventType>, DomainError> {
        let row: Option<EventTypeRow> =
            sqlx::query_as("SELECT id, short_name, name, requires_activity FROM event_types WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("finding event type", e))?;
        Ok(row.map(EventType::from))
    }

    async fn find_activity_types(&self, ids: &[Uuid]) -> Result<Vec<ActivityType>, DomainError> {
        let rows: Vec<ActivityTypeRow> = sqlx::query_as(
            "SELECT id, short_name, name, kind, deprecated FROM activity_types WHERE id = ANY($1) ORDER BY short_name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("finding activity types", e))?;
        convert_all(rows)
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_users(&mut conn, ids).await
    }

    async fn roles_of_users(&self, ids: &[Uuid]) -> Result<Vec<Role>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_roles(&mut conn, ids).await
    }
}
