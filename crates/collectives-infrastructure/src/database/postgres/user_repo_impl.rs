// ============================================================================
// Collectives Infrastructure - PostgreSQL User Repository
// File: crates/collectives-infrastructure/src/database/postgres/user_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use collectives_core::domain::{Badge, Role, User};
use collectives_core::error::DomainError;
use collectives_core::listing::badges::BadgeRow;
use collectives_core::listing::BadgeQuery;
use collectives_core::repositories::UserRepository;

use super::predicate_sql::{push_badge_conditions, push_badge_order};
use super::rows::{fetch_badges, fetch_roles, fetch_user, BadgeRecord};
use crate::database::error::map_sqlx_error;

pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const BADGE_LISTING_FROM: &str = r#"
    FROM badges b
    JOIN users u ON u.id = b.user_id
    LEFT JOIN activity_types a ON a.id = b.activity_id
    WHERE "#;

// Badge columns joined with the display names
#[derive(Debug, FromRow)]
struct BadgeListingRecord {
    #[sqlx(flatten)]
    badge: BadgeRecord,
    user_full_name: String,
    activity_name: Option<String>,
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_user(&mut conn, id, false).await
    }

    async fn roles(&self, user_id: &Uuid) -> Result<Vec<Role>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_roles(&mut conn, std::slice::from_ref(user_id)).await
    }

    async fn badges(&self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_badges(&mut conn, user_id).await
    }

    async fn list_badges(&self, query: &BadgeQuery) -> Result<(Vec<BadgeRow>, u64), DomainError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(BADGE_LISTING_FROM);
        push_badge_conditions(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("counting badges", e))?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT b.id, b.user_id, b.kind, b.level, b.activity_id, b.expiration_date, b.grantor_id, \
             b.creation_time, b.registration_id, \
             (u.first_name || ' ' || u.last_name) AS user_full_name, a.name AS activity_name",
        );
        select.push(BADGE_LISTING_FROM);
        push_badge_conditions(&mut select, query);
        push_badge_order(&mut select, query);
        select
            .push(" LIMIT ")
            .push_bind(query.pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.pagination.offset() as i64);
        debug!(sql = %select.sql(), "badge listing query");

        let records: Vec<BadgeListingRecord> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("listing badges", e))?;

        let rows = records
            .into_iter()
            .map(|record| {
                Ok(BadgeRow {
                    badge: Badge::try_from(record.badge)?,
                    user_full_name: record.user_full_name,
                    activity_name: record.activity_name,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        Ok((rows, total.max(0) as u64))
    }
}
