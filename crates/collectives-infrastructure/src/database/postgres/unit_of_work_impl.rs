// ============================================================================
// Collectives Infrastructure - PostgreSQL Unit of Work
// File: crates/collectives-infrastructure/src/database/postgres/unit_of_work_impl.rs
// Description: Row-locking transactions backing every registration command
// ============================================================================

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{PgConnection, PgPool, Postgres};
use tracing::debug;
use uuid::Uuid;

use collectives_core::domain::{
    Badge, Event, EventStatus, Registration, RegistrationStatus, Role, User,
};
use collectives_core::error::DomainError;
use collectives_core::repositories::{Transaction, UnitOfWork};

use super::rows::{
    convert_all, fetch_badges, fetch_event, fetch_roles, fetch_user, RegistrationRow,
    BADGE_COLUMNS, REGISTRATION_COLUMNS,
};
use crate::database::error::map_sqlx_error;

pub struct PgUnitOfWork {
    pool: PgPool,
}

impl PgUnitOfWork {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("opening transaction", e))?;
        // Each statement must see rows committed while it waited on the event lock
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("setting isolation level", e))?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

/// Open transaction; dropping it without `commit` rolls back.
pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    /// Rewrites the activity, leader and tag rows of `event`.
    async fn write_event_children(&mut self, event: &Event) -> Result<(), DomainError> {
        for table in ["event_activity_types", "event_leaders", "event_tags"] {
            sqlx::query(&format!("DELETE FROM {} WHERE event_id = $1", table))
                .bind(event.id)
                .execute(self.conn())
                .await
                .map_err(|e| map_sqlx_error("clearing event children", e))?;
        }

        let activity_ids: Vec<Uuid> = event.activity_ids().collect();
        sqlx::query(
            "INSERT INTO event_activity_types (event_id, activity_type_id) SELECT $1, UNNEST($2::uuid[])",
        )
        .bind(event.id)
        .bind(&activity_ids)
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("writing event activities", e))?;

        let leader_ids: Vec<Uuid> = event.leaders.iter().map(|l| l.id).collect();
        sqlx::query(
            r#"
            INSERT INTO event_leaders (event_id, user_id, position)
            SELECT $1, leader.id, leader.position::int
            FROM UNNEST($2::uuid[]) WITH ORDINALITY AS leader(id, position)
            "#,
        )
        .bind(event.id)
        .bind(&leader_ids)
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("writing event leaders", e))?;

        sqlx::query("INSERT INTO event_tags (event_id, tag) SELECT DISTINCT $1, UNNEST($2::text[])")
            .bind(event.id)
            .bind(&event.tags)
            .execute(self.conn())
            .await
            .map_err(|e| map_sqlx_error("writing event tags", e))?;
        Ok(())
    }
}

fn registration_select(condition: &str) -> String {
    format!(
        "SELECT {} FROM registrations WHERE {} ORDER BY registration_time, id",
        REGISTRATION_COLUMNS, condition
    )
}

fn event_query<'q>(sql: &'q str, event: &'q Event) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    sqlx::query(sql)
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start)
        .bind(event.end)
        .bind(event.num_slots)
        .bind(event.num_online_slots)
        .bind(event.num_waiting_list)
        .bind(event.include_leaders_in_counts)
        .bind(event.registration_open)
        .bind(event.registration_close)
        .bind(event.status.as_str())
        .bind(event.visibility.as_str())
        .bind(event.requires_payment)
        .bind(event.event_type.id)
        .bind(event.main_leader_id)
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn lock_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
        let locked: Option<Uuid> = sqlx::query_scalar("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| map_sqlx_error("locking event", e))?;
        if locked.is_none() {
            return Ok(None);
        }
        debug!(event_id = %event_id, "event row locked");
        fetch_event(self.conn(), event_id).await
    }

    async fn find_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
        fetch_event(self.conn(), event_id).await
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), DomainError> {
        event_query(
            r#"
            INSERT INTO events (
                id, title, description, start_time, end_time,
                num_slots, num_online_slots, num_waiting_list, include_leaders_in_counts,
                registration_open_time, registration_close_time,
                status, visibility, requires_payment, event_type_id, main_leader_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
            event,
        )
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("inserting event", e))?;
        self.write_event_children(event).await
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), DomainError> {
        event_query(
            r#"
            UPDATE events
            SET
                title = $2,
                description = $3,
                start_time = $4,
                end_time = $5,
                num_slots = $6,
                num_online_slots = $7,
                num_waiting_list = $8,
                include_leaders_in_counts = $9,
                registration_open_time = $10,
                registration_close_time = $11,
                status = $12,
                visibility = $13,
                requires_payment = $14,
                event_type_id = $15,
                main_leader_id = $16
            WHERE id = $1
            "#,
            event,
        )
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("updating event", e))?;
        self.write_event_children(event).await
    }

    async fn lock_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError> {
        fetch_user(self.conn(), user_id, true).await
    }

    async fn find_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError> {
        fetch_user(self.conn(), user_id, false).await
    }

    async fn update_license_expiry(&mut self, user_id: &Uuid, expiry: NaiveDate) -> Result<(), DomainError> {
        sqlx::query("UPDATE users SET license_expiry_date = $2 WHERE id = $1")
            .bind(user_id)
            .bind(expiry)
            .execute(self.conn())
            .await
            .map_err(|e| map_sqlx_error("updating license expiry", e))?;
        Ok(())
    }

    async fn user_roles(&mut self, user_id: &Uuid) -> Result<Vec<Role>, DomainError> {
        fetch_roles(self.conn(), std::slice::from_ref(user_id)).await
    }

    async fn find_registration(&mut self, id: &Uuid) -> Result<Option<Registration>, DomainError> {
        let sql = format!("SELECT {} FROM registrations WHERE id = $1", REGISTRATION_COLUMNS);
        let row: Option<RegistrationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(self.conn())
            .await
            .map_err(|e| map_sqlx_error("finding registration", e))?;
        row.map(Registration::try_from).transpose()
    }

    async fn event_registrations(&mut self, event_id: &Uuid) -> Result<Vec<Registration>, DomainError> {
        let sql = registration_select("event_id = $1");
        let rows: Vec<RegistrationRow> = sqlx::query_as(&sql)
            .bind(event_id)
            .fetch_all(self.conn())
            .await
            .map_err(|e| map_sqlx_error("loading event registrations", e))?;
        convert_all(rows)
    }

    async fn user_registrations_with_status(
        &mut self,
        user_id: &Uuid,
        status: RegistrationStatus,
    ) -> Result<Vec<Registration>, DomainError> {
        let sql = registration_select("user_id = $1 AND status = $2");
        let rows: Vec<RegistrationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(status.as_str())
            .fetch_all(self.conn())
            .await
            .map_err(|e| map_sqlx_error("loading user registrations", e))?;
        convert_all(rows)
    }

    async fn registrations_during(
        &mut self,
        user_id: &Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluded_event_id: &Uuid,
        include_waiting: bool,
    ) -> Result<Vec<Registration>, DomainError> {
        let mut statuses: Vec<&str> = RegistrationStatus::ALL
            .iter()
            .filter(|s| s.is_holding_slot())
            .map(|s| s.as_str())
            .collect();
        if include_waiting {
            statuses.push(RegistrationStatus::WaitingList.as_str());
        }
        let sql = registration_select(
            r#"
            user_id = $1
            AND status = ANY($2)
            AND event_id IN (
                SELECT e.id
                FROM events e
                JOIN event_types t ON t.id = e.event_type_id
                WHERE t.requires_activity
                  AND e.status = $3
                  AND e.id <> $4
                  AND e.start_time < $6
                  AND e.end_time > $5
            )
            "#,
        );
        let rows: Vec<RegistrationRow> = sqlx::query_as(&sql)
            .bind(user_id)
            .bind(&statuses)
            .bind(EventStatus::Confirmed.as_str())
            .bind(excluded_event_id)
            .bind(start)
            .bind(end)
            .fetch_all(self.conn())
            .await
            .map_err(|e| map_sqlx_error("loading overlapping registrations", e))?;
        convert_all(rows)
    }

    async fn stale_payment_registrations(
        &mut self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Registration>, DomainError> {
        let sql = registration_select("status = $1 AND registration_time < $2");
        let rows: Vec<RegistrationRow> = sqlx::query_as(&sql)
            .bind(RegistrationStatus::PaymentPending.as_str())
            .bind(cutoff)
            .fetch_all(self.conn())
            .await
            .map_err(|e| map_sqlx_error("loading stale payments", e))?;
        convert_all(rows)
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO registrations (id, user_id, event_id, status, level, is_self, registration_time)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(registration.id)
        .bind(registration.user_id)
        .bind(registration.event_id)
        .bind(registration.status.as_str())
        .bind(registration.level.as_str())
        .bind(registration.is_self)
        .bind(registration.registration_time)
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("inserting registration", e))?;
        Ok(())
    }

    async fn update_registration(&mut self, registration: &Registration) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE registrations
            SET status = $2, level = $3, is_self = $4, registration_time = $5
            WHERE id = $1
            "#,
        )
        .bind(registration.id)
        .bind(registration.status.as_str())
        .bind(registration.level.as_str())
        .bind(registration.is_self)
        .bind(registration.registration_time)
        .execute(self.conn())
        .await
        .map_err(|e| map_sqlx_error("updating registration", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("registration", registration.id));
        }
        Ok(())
    }

    async fn delete_registration(&mut self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await
            .map_err(|e| map_sqlx_error("deleting registration", e))?;
        Ok(())
    }

    async fn user_badges(&mut self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError> {
        fetch_badges(self.conn(), user_id).await
    }

    async fn insert_badge(&mut self, badge: &Badge) -> Result<(), DomainError> {
        let sql = format!(
            "INSERT INTO badges ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            BADGE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(badge.id)
            .bind(badge.user_id)
            .bind(badge.kind.tag())
            .bind(badge.kind.level())
            .bind(badge.activity_id)
            .bind(badge.expiration_date)
            .bind(badge.grantor_id)
            .bind(badge.creation_time)
            .bind(badge.registration_id)
            .execute(self.conn())
            .await
            .map_err(|e| map_sqlx_error("inserting badge", e))?;
        Ok(())
    }

    async fn delete_badge(&mut self, id: &Uuid) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM badges WHERE id = $1")
            .bind(id)
            .execute(self.conn())
            .await
            .map_err(|e| map_sqlx_error("deleting badge", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("committing transaction", e))
    }
}

