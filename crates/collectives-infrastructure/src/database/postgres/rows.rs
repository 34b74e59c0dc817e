// ============================================================================
// Collectives Infrastructure - Row Mapping
// File: crates/collectives-infrastructure/src/database/postgres/rows.rs
// Description: SQLx row types and loaders shared by the PostgreSQL adapters
// ============================================================================

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

use collectives_core::domain::{
    ActivityKind, ActivityType, Badge, BadgeKind, Event, EventStatus, EventType, EventVisibility,
    LeaderRef, Registration, RegistrationLevel, RegistrationStatus, Role, RoleKind, User, UserType,
};
use collectives_core::error::DomainError;

use crate::database::error::{corrupt, map_sqlx_error};

pub(crate) const EVENT_COLUMNS: &str = r#"
    e.id, e.title, e.description, e.start_time, e.end_time,
    e.num_slots, e.num_online_slots, e.num_waiting_list, e.include_leaders_in_counts,
    e.registration_open_time, e.registration_close_time,
    e.status, e.visibility, e.requires_payment, e.main_leader_id,
    t.id AS event_type_id, t.short_name AS event_type_short_name,
    t.name AS event_type_name, t.requires_activity AS event_type_requires_activity
"#;

pub(crate) const EVENT_FROM: &str = " FROM events e JOIN event_types t ON t.id = e.event_type_id";

pub(crate) const USER_COLUMNS: &str = r#"
    id, mail, license, first_name, last_name, date_of_birth, phone,
    emergency_contact_name, emergency_contact_phone, enabled,
    license_expiry_date, user_type, auth0_id
"#;

pub(crate) const REGISTRATION_COLUMNS: &str =
    "id, user_id, event_id, status, level, is_self, registration_time";

pub(crate) const BADGE_COLUMNS: &str =
    "id, user_id, kind, level, activity_id, expiration_date, grantor_id, creation_time, registration_id";

// Internal row types for SQLx mapping

#[derive(Debug, FromRow)]
pub(crate) struct EventRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub num_slots: i32,
    pub num_online_slots: i32,
    pub num_waiting_list: i32,
    pub include_leaders_in_counts: bool,
    pub registration_open_time: NaiveDateTime,
    pub registration_close_time: NaiveDateTime,
    pub status: String,
    pub visibility: String,
    pub requires_payment: bool,
    pub main_leader_id: Option<Uuid>,
    pub event_type_id: Uuid,
    pub event_type_short_name: String,
    pub event_type_name: String,
    pub event_type_requires_activity: bool,
}

#[derive(Debug, FromRow)]
struct EventActivityRow {
    event_id: Uuid,
    id: Uuid,
    short_name: String,
    name: String,
    kind: String,
    deprecated: bool,
}

#[derive(Debug, FromRow)]
struct EventLeaderRow {
    event_id: Uuid,
    user_id: Uuid,
    first_name: String,
    last_name: String,
}

#[derive(Debug, FromRow)]
struct EventTagRow {
    event_id: Uuid,
    tag: String,
}

#[derive(Debug, FromRow)]
pub(crate) struct ActivityTypeRow {
    pub id: Uuid,
    pub short_name: String,
    pub name: String,
    pub kind: String,
    pub deprecated: bool,
}

impl TryFrom<ActivityTypeRow> for ActivityType {
    type Error = DomainError;

    fn try_from(row: ActivityTypeRow) -> Result<Self, Self::Error> {
        Ok(ActivityType {
            id: row.id,
            kind: ActivityKind::from_str(&row.kind).ok_or_else(|| corrupt("activity kind", &row.kind))?,
            short_name: row.short_name,
            name: row.name,
            deprecated: row.deprecated,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct EventTypeRow {
    pub id: Uuid,
    pub short_name: String,
    pub name: String,
    pub requires_activity: bool,
}

impl From<EventTypeRow> for EventType {
    fn from(row: EventTypeRow) -> Self {
        EventType {
            id: row.id,
            short_name: row.short_name,
            name: row.name,
            requires_activity: row.requires_activity,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub mail: String,
    pub license: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub enabled: bool,
    pub license_expiry_date: Option<NaiveDate>,
    pub user_type: String,
    pub auth0_id: Option<String>,
}

impl TryFrom<UserRow> for User {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            user_type: UserType::from_str(&row.user_type).ok_or_else(|| corrupt("user type", &row.user_type))?,
            mail: row.mail,
            license: row.license,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth,
            phone: row.phone,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            enabled: row.enabled,
            license_expiry_date: row.license_expiry_date,
            auth0_id: row.auth0_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RoleRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub activity_id: Option<Uuid>,
}

impl TryFrom<RoleRow> for Role {
    type Error = DomainError;

    fn try_from(row: RoleRow) -> Result<Self, Self::Error> {
        Ok(Role {
            id: row.id,
            user_id: row.user_id,
            kind: RoleKind::from_str(&row.kind).ok_or_else(|| corrupt("role kind", &row.kind))?,
            activity_id: row.activity_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RegistrationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub status: String,
    pub level: String,
    pub is_self: bool,
    pub registration_time: NaiveDateTime,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = DomainError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        Ok(Registration {
            id: row.id,
            user_id: row.user_id,
            event_id: row.event_id,
            status: RegistrationStatus::from_str(&row.status)
                .ok_or_else(|| corrupt("registration status", &row.status))?,
            level: RegistrationLevel::from_str(&row.level)
                .ok_or_else(|| corrupt("registration level", &row.level))?,
            is_self: row.is_self,
            registration_time: row.registration_time,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct BadgeRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub level: Option<i32>,
    pub activity_id: Option<Uuid>,
    pub expiration_date: NaiveDate,
    pub grantor_id: Option<Uuid>,
    pub creation_time: NaiveDateTime,
    pub registration_id: Option<Uuid>,
}

impl TryFrom<BadgeRecord> for Badge {
    type Error = DomainError;

    fn try_from(row: BadgeRecord) -> Result<Self, Self::Error> {
        Ok(Badge {
            id: row.id,
            user_id: row.user_id,
            kind: BadgeKind::from_parts(&row.kind, row.level).ok_or_else(|| corrupt("badge kind", &row.kind))?,
            activity_id: row.activity_id,
            expiration_date: row.expiration_date,
            grantor_id: row.grantor_id,
            creation_time: row.creation_time,
            registration_id: row.registration_id,
        })
    }
}

pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, DomainError>
where
    T: TryFrom<R, Error = DomainError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// `ILIKE` pattern matching `needle` as a plain substring.
pub(crate) fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ----------------------------------------------------------------------------
// Loaders
// ----------------------------------------------------------------------------

/// Completes event rows with their activities, leaders and tags, keeping the
/// row order. The same event may appear on several rows.
pub(crate) async fn hydrate_events(
    conn: &mut PgConnection,
    rows: Vec<EventRow>,
) -> Result<Vec<Event>, DomainError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

    let activity_rows: Vec<EventActivityRow> = sqlx::query_as(
        r#"
        SELECT eat.event_id, a.id, a.short_name, a.name, a.kind, a.deprecated
        FROM event_activity_types eat
        JOIN activity_types a ON a.id = eat.activity_type_id
        WHERE eat.event_id = ANY($1)
        ORDER BY a.short_name
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("loading event activities", e))?;

    let leader_rows: Vec<EventLeaderRow> = sqlx::query_as(
        r#"
        SELECT el.event_id, u.id AS user_id, u.first_name, u.last_name
        FROM event_leaders el
        JOIN users u ON u.id = el.user_id
        WHERE el.event_id = ANY($1)
        ORDER BY el.position
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("loading event leaders", e))?;

    let tag_rows: Vec<EventTagRow> =
        sqlx::query_as("SELECT event_id, tag FROM event_tags WHERE event_id = ANY($1) ORDER BY tag")
            .bind(&ids)
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("loading event tags", e))?;

    let mut activities: HashMap<Uuid, Vec<ActivityType>> = HashMap::new();
    for row in activity_rows {
        let event_id = row.event_id;
        let activity = ActivityType::try_from(ActivityTypeRow {
            id: row.id,
            short_name: row.short_name,
            name: row.name,
            kind: row.kind,
            deprecated: row.deprecated,
        })?;
        activities.entry(event_id).or_default().push(activity);
    }
    let mut leaders: HashMap<Uuid, Vec<LeaderRef>> = HashMap::new();
    for row in leader_rows {
        leaders.entry(row.event_id).or_default().push(LeaderRef {
            id: row.user_id,
            full_name: format!("{} {}", row.first_name, row.last_name),
        });
    }
    let mut tags: HashMap<Uuid, Vec<String>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.event_id).or_default().push(row.tag);
    }

    rows.into_iter()
        .map(|row| {
            Ok(Event {
                id: row.id,
                title: row.title,
                description: row.description,
                start: row.start_time,
                end: row.end_time,
                num_slots: row.num_slots,
                num_online_slots: row.num_online_slots,
                num_waiting_list: row.num_waiting_list,
                include_leaders_in_counts: row.include_leaders_in_counts,
                registration_open: row.registration_open_time,
                registration_close: row.registration_close_time,
                status: EventStatus::from_str(&row.status).ok_or_else(|| corrupt("event status", &row.status))?,
                visibility: EventVisibility::from_str(&row.visibility)
                    .ok_or_else(|| corrupt("event visibility", &row.visibility))?,
                requires_payment: row.requires_payment,
                event_type: EventType {
                    id: row.event_type_id,
                    short_name: row.event_type_short_name,
                    name: row.event_type_name,
                    requires_activity: row.event_type_requires_activity,
                },
                activity_types: activities.get(&row.id).cloned().unwrap_or_default(),
                tags: tags.get(&row.id).cloned().unwrap_or_default(),
                leaders: leaders.get(&row.id).cloned().unwrap_or_default(),
                main_leader_id: row.main_leader_id,
            })
        })
        .collect()
}

pub(crate) async fn fetch_event(conn: &mut PgConnection, id: &Uuid) -> Result<Option<Event>, DomainError> {
    let sql = format!("SELECT {}{} WHERE e.id = $1", EVENT_COLUMNS, EVENT_FROM);
    let row: Option<EventRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("finding event", e))?;
    match row {
        Some(row) => Ok(hydrate_events(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_user(
    conn: &mut PgConnection,
    id: &Uuid,
    for_update: bool,
) -> Result<Option<User>, DomainError> {
    let sql = format!(
        "SELECT {} FROM users WHERE id = $1{}",
        USER_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: Option<UserRow> = sqlx::query_as(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| map_sqlx_error("finding user", e))?;
    row.map(User::try_from).transpose()
}

pub(crate) async fn fetch_users(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<User>, DomainError> {
    let sql = format!("SELECT {} FROM users WHERE id = ANY($1)", USER_COLUMNS);
    let rows: Vec<UserRow> = sqlx::query_as(&sql)
        .bind(ids)
        .fetch_all(conn)
        .await
        .map_err(|e| map_sqlx_error("finding users", e))?;
    convert_all(rows)
}

pub(crate) async fn fetch_roles(conn: &mut PgConnection, user_ids: &[Uuid]) -> Result<Vec<Role>, DomainError> {
    let rows: Vec<RoleRow> =
        sqlx::query_as("SELECT id, user_id, kind, activity_id FROM roles WHERE user_id = ANY($1)")
            .bind(user_ids)
            .fetch_all(conn)
            .await
            .map_err(|e| map_sqlx_error("loading roles", e))?;
    convert_all(rows)
}

pub(crate) async fn fetch_badges(conn: &mut PgConnection, user_id: &Uuid) -> Result<Vec<Badge>, DomainError> {
    let sql = format!("SELECT {} FROM badges WHERE user_id = $1 ORDER BY creation_time, id", BADGE_COLUMNS);
    let rows: Vec<BadgeRecord> = sqlx::query_as(&sql)
        .bind(user_id)
        .fetch_all(conn)
        .await
        .map_err(|e| map_sqlx_error("loading badges", e))?;
    convert_all(rows)
}
