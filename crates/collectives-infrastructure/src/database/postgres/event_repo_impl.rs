// ============================================================================
// Collectives Infrastructure - PostgreSQL Event Repository
// File: crates/collectives-infrastructure/src/database/postgres/event_repo_impl.rs
// ============================================================================

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use collectives_core::domain::{Event, Registration};
use collectives_core::error::DomainError;
use collectives_core::listing::{EventQuery, UserEventQuery};
use collectives_core::repositories::{EventRepository, UserEventRow};

use super::predicate_sql::{push_event_order, push_predicate, push_status_filter};
use super::rows::{fetch_event, hydrate_events, EventRow, RegistrationRow, EVENT_COLUMNS, EVENT_FROM};
use crate::database::error::map_sqlx_error;

pub struct PgEventRepository {
    pool: PgPool,
}

impl PgEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Event columns followed by the joined registration
#[derive(Debug, FromRow)]
struct UserEventRecord {
    #[sqlx(flatten)]
    event: EventRow,
    reg_id: Uuid,
    reg_user_id: Uuid,
    reg_status: String,
    reg_level: String,
    reg_is_self: bool,
    reg_registration_time: NaiveDateTime,
}

fn push_user_join(qb: &mut QueryBuilder<'_, Postgres>, user_id: &Uuid, query: &UserEventQuery) {
    qb.push(" JOIN registrations r ON r.event_id = e.id AND r.user_id = ")
        .push_bind(*user_id)
        .push(" WHERE ");
    push_predicate(qb, &query.events.predicate);
    if let Some(filter) = &query.registration_status {
        qb.push(" AND ");
        push_status_filter(qb, filter);
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Event>, DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;
        fetch_event(&mut conn, id).await
    }

    async fn list(&self, query: &EventQuery) -> Result<(Vec<Event>, u64), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(EVENT_FROM).push(" WHERE ");
        push_predicate(&mut count, &query.predicate);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("counting events", e))?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(EVENT_COLUMNS).push(EVENT_FROM).push(" WHERE ");
        push_predicate(&mut select, &query.predicate);
        push_event_order(&mut select, &query.sort);
        select
            .push(" LIMIT ")
            .push_bind(query.pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.pagination.offset() as i64);
        debug!(sql = %select.sql(), "event listing query");

        let rows: Vec<EventRow> = select
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("listing events", e))?;
        let events = hydrate_events(&mut conn, rows).await?;
        Ok((events, total.max(0) as u64))
    }

    async fn list_for_user(
        &self,
        user_id: &Uuid,
        query: &UserEventQuery,
    ) -> Result<(Vec<UserEventRow>, u64), DomainError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquiring connection", e))?;

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        count.push(EVENT_FROM);
        push_user_join(&mut count, user_id, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("counting user events", e))?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT ");
        select.push(EVENT_COLUMNS).push(
            ", r.id AS reg_id, r.user_id AS reg_user_id, r.status AS reg_status, r.level AS reg_level, \
             r.is_self AS reg_is_self, r.registration_time AS reg_registration_time",
        );
        select.push(EVENT_FROM);
        push_user_join(&mut select, user_id, query);
        push_event_order(&mut select, &query.events.sort);
        select
            .push(", r.id ASC LIMIT ")
            .push_bind(query.events.pagination.limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.events.pagination.offset() as i64);

        let records: Vec<UserEventRecord> = select
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("listing user events", e))?;

        let mut registrations = Vec::with_capacity(records.len());
        let mut event_rows = Vec::with_capacity(records.len());
        for record in records {
            registrations.push(Registration::try_from(RegistrationRow {
                id: record.reg_id,
                user_id: record.reg_user_id,
                event_id: record.event.id,
                status: record.reg_status,
                level: record.reg_level,
                is_self: record.reg_is_self,
                registration_time: record.reg_registration_time,
            })?);
            event_rows.push(record.event);
        }
        let events = hydrate_events(&mut conn, event_rows).await?;

        let rows = events
            .into_iter()
            .zip(registrations)
            .map(|(event, registration)| UserEventRow { event, registration })
            .collect();
        Ok((rows, total.max(0) as u64))
    }
}
