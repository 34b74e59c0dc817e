// ============================================================================
// Collectives Core - In-memory Store
// File: crates/collectives-core/src/memory.rs
// Description: Repository implementations over process memory
// ============================================================================
//! A transaction owns the store mutex for its whole lifetime and mutates a
//! staged copy, published on commit. Transactions are therefore fully
//! serialised, a stricter order than the row locks taken in PostgreSQL.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::{
    ActivityType, Badge, Event, EventStatus, EventType, Registration, RegistrationStatus, Role,
    User,
};
use crate::error::DomainError;
use crate::listing::{badges::BadgeRow, BadgeQuery, EventQuery, UserEventQuery};
use crate::repositories::{
    CatalogRepository, EventRepository, Transaction, UnitOfWork, UserEventRow, UserRepository,
};

#[derive(Debug, Default, Clone)]
struct StoreState {
    users: BTreeMap<Uuid, User>,
    roles: Vec<Role>,
    badges: BTreeMap<Uuid, Badge>,
    activity_types: BTreeMap<Uuid, ActivityType>,
    event_types: BTreeMap<Uuid, EventType>,
    events: BTreeMap<Uuid, Event>,
    registrations: BTreeMap<Uuid, Registration>,
}

impl StoreState {
    fn insert_user(&mut self, user: User) -> Result<(), DomainError> {
        let duplicate = self.users.values().any(|u| {
            u.id != user.id && (u.mail.eq_ignore_ascii_case(&user.mail) || u.license == user.license)
        });
        if duplicate {
            return Err(DomainError::Conflict(format!("user {} already exists", user.mail)));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    fn insert_role(&mut self, role: Role) -> Result<(), DomainError> {
        let duplicate = self
            .roles
            .iter()
            .any(|r| r.user_id == role.user_id && r.kind == role.kind && r.activity_id == role.activity_id);
        if duplicate {
            return Err(DomainError::Conflict(format!("role {} already granted", role.kind.as_str())));
        }
        self.roles.push(role);
        Ok(())
    }

    fn insert_event(&mut self, event: Event) {
        self.event_types.entry(event.event_type.id).or_insert_with(|| event.event_type.clone());
        for activity in &event.activity_types {
            self.activity_types.entry(activity.id).or_insert_with(|| activity.clone());
        }
        self.events.insert(event.id, event);
    }

    fn insert_registration(&mut self, registration: Registration) -> Result<(), DomainError> {
        if !self.events.contains_key(&registration.event_id) {
            return Err(DomainError::not_found("event", registration.event_id));
        }
        if !registration.status.is_terminal() {
            let duplicate = self.registrations.values().any(|r| {
                r.id != registration.id
                    && r.user_id == registration.user_id
                    && r.event_id == registration.event_id
                    && !r.status.is_terminal()
            });
            if duplicate {
                return Err(DomainError::Conflict("user already has an active registration".into()));
            }
        }
        self.registrations.insert(registration.id, registration);
        Ok(())
    }

    fn registrations_of_event(&self, event_id: &Uuid) -> Vec<Registration> {
        let mut regs: Vec<_> = self
            .registrations
            .values()
            .filter(|r| &r.event_id == event_id)
            .cloned()
            .collect();
        regs.sort_by_key(|r| r.queue_key());
        regs
    }

    fn badges_of(&self, user_id: &Uuid) -> Vec<Badge> {
        self.badges.values().filter(|b| &b.user_id == user_id).cloned().collect()
    }
}

fn page<T>(mut rows: Vec<T>, offset: u64, limit: u64) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let start = (offset as usize).min(rows.len());
    let end = start.saturating_add(limit as usize).min(rows.len());
    let data = rows.drain(start..end).collect();
    (data, total)
}

/// Whole-database stand-in used by tests and by the server without PostgreSQL.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: User) -> Result<(), DomainError> {
        self.state.lock().await.insert_user(user)
    }

    pub async fn add_role(&self, role: Role) -> Result<(), DomainError> {
        self.state.lock().await.insert_role(role)
    }

    pub async fn add_badge(&self, badge: Badge) {
        self.state.lock().await.badges.insert(badge.id, badge);
    }

    pub async fn add_activity_type(&self, activity: ActivityType) {
        self.state.lock().await.activity_types.insert(activity.id, activity);
    }

    pub async fn add_event_type(&self, event_type: EventType) {
        self.state.lock().await.event_types.insert(event_type.id, event_type);
    }

    /// Stores the event together with its event type and activities.
    pub async fn add_event(&self, event: Event) {
        self.state.lock().await.insert_event(event);
    }

    pub async fn add_registration(&self, registration: Registration) -> Result<(), DomainError> {
        self.state.lock().await.insert_registration(registration)
    }

    pub async fn registration(&self, id: &Uuid) -> Option<Registration> {
        self.state.lock().await.registrations.get(id).cloned()
    }

    /// Registrations of an event in waiting-list order.
    pub async fn event_registrations(&self, event_id: &Uuid) -> Vec<Registration> {
        self.state.lock().await.registrations_of_event(event_id)
    }

    pub async fn user(&self, id: &Uuid) -> Option<User> {
        self.state.lock().await.users.get(id).cloned()
    }

    pub async fn user_badges(&self, user_id: &Uuid) -> Vec<Badge> {
        self.state.lock().await.badges_of(user_id)
    }
}

pub struct MemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    staged: StoreState,
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn lock_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
        // The whole store is already held by this transaction
        self.find_event(event_id).await
    }

    async fn find_event(&mut self, event_id: &Uuid) -> Result<Option<Event>, DomainError> {
        Ok(self.staged.events.get(event_id).cloned())
    }

    async fn insert_event(&mut self, event: &Event) -> Result<(), DomainError> {
        if self.staged.events.contains_key(&event.id) {
            return Err(DomainError::Conflict(format!("event {} already exists", event.id)));
        }
        self.staged.insert_event(event.clone());
        Ok(())
    }

    async fn update_event(&mut self, event: &Event) -> Result<(), DomainError> {
        if !self.staged.events.contains_key(&event.id) {
            return Err(DomainError::not_found("event", event.id));
        }
        self.staged.insert_event(event.clone());
        Ok(())
    }

    async fn lock_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError> {
        self.find_user(user_id).await
    }

    async fn find_user(&mut self, user_id: &Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.staged.users.get(user_id).cloned())
    }

    async fn update_license_expiry(&mut self, user_id: &Uuid, expiry: NaiveDate) -> Result<(), DomainError> {
        let user = self
            .staged
            .users
            .get_mut(user_id)
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        user.license_expiry_date = Some(expiry);
        Ok(())
    }

    async fn user_roles(&mut self, user_id: &Uuid) -> Result<Vec<Role>, DomainError> {
        Ok(self.staged.roles.iter().filter(|r| &r.user_id == user_id).cloned().collect())
    }

    async fn find_registration(&mut self, id: &Uuid) -> Result<Option<Registration>, DomainError> {
        Ok(self.staged.registrations.get(id).cloned())
    }

    async fn event_registrations(&mut self, event_id: &Uuid) -> Result<Vec<Registration>, DomainError> {
        Ok(self.staged.registrations_of_event(event_id))
    }

    async fn user_registrations_with_status(
        &mut self,
        user_id: &Uuid,
        status: RegistrationStatus,
    ) -> Result<Vec<Registration>, DomainError> {
        Ok(self
            .staged
            .registrations
            .values()
            .filter(|r| &r.user_id == user_id && r.status == status)
            .cloned()
            .collect())
    }

    async fn registrations_during(
        &mut self,
        user_id: &Uuid,
        start: NaiveDateTime,
        end: NaiveDateTime,
        excluded_event_id: &Uuid,
        include_waiting: bool,
    ) -> Result<Vec<Registration>, DomainError> {
        let events = &self.staged.events;
        let mut regs: Vec<Registration> = self
            .staged
            .registrations
            .values()
            .filter(|r| &r.user_id == user_id && &r.event_id != excluded_event_id)
            .filter(|r| r.status.is_holding_slot() || (include_waiting && r.status.is_waiting()))
            .filter(|r| {
                events.get(&r.event_id).is_some_and(|e| {
                    e.status == EventStatus::Confirmed
                        && e.event_type.requires_activity
                        && e.overlaps(start, end)
                })
            })
            .cloned()
            .collect();
        regs.sort_by_key(|r| r.queue_key());
        Ok(regs)
    }

    async fn stale_payment_registrations(
        &mut self,
        cutoff: NaiveDateTime,
    ) -> Result<Vec<Registration>, DomainError> {
        Ok(self
            .staged
            .registrations
            .values()
            .filter(|r| r.status == RegistrationStatus::PaymentPending && r.registration_time < cutoff)
            .cloned()
            .collect())
    }

    async fn insert_registration(&mut self, registration: &Registration) -> Result<(), DomainError> {
        if self.staged.registrations.contains_key(&registration.id) {
            return Err(DomainError::Conflict(format!("registration {} already exists", registration.id)));
        }
        self.staged.insert_registration(registration.clone())
    }

    async fn update_registration(&mut self, registration: &Registration) -> Result<(), DomainError> {
        if !self.staged.registrations.contains_key(&registration.id) {
            return Err(DomainError::not_found("registration", registration.id));
        }
        self.staged.insert_registration(registration.clone())
    }

    async fn delete_registration(&mut self, id: &Uuid) -> Result<(), DomainError> {
        self.staged
            .registrations
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found("registration", id))
    }

    async fn user_badges(&mut self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError> {
        Ok(self.staged.badges_of(user_id))
    }

    async fn insert_badge(&mut self, badge: &Badge) -> Result<(), DomainError> {
        self.staged.badges.insert(badge.id, badge.clone());
        Ok(())
    }

    async fn delete_badge(&mut self, id: &Uuid) -> Result<(), DomainError> {
        self.staged.badges.remove(id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}

#[async_trait]
impl EventRepository for InMemoryStore {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Event>, DomainError> {
        Ok(self.state.lock().await.events.get(id).cloned())
    }

    async fn list(&self, query: &EventQuery) -> Result<(Vec<Event>, u64), DomainError> {
        let state = self.state.lock().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| query.predicate.matches(e))
            .cloned()
            .collect();
        events.sort_by(|a, b| query.sort.compare(a, b));
        Ok(page(events, query.pagination.offset(), query.pagination.limit()))
    }

    async fn list_for_user(
        &self,
        user_id: &Uuid,
        query: &UserEventQuery,
    ) -> Result<(Vec<UserEventRow>, u64), DomainError> {
        let state = self.state.lock().await;
        let mut rows: Vec<UserEventRow> = state
            .registrations
            .values()
            .filter(|r| &r.user_id == user_id)
            .filter(|r| query.registration_status.as_ref().map_or(true, |f| f.admits(r.status)))
            .filter_map(|r| {
                let event = state.events.get(&r.event_id)?;
                query.events.predicate.matches(event).then(|| UserEventRow {
                    event: event.clone(),
                    registration: r.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            query
                .events
                .sort
                .compare(&a.event, &b.event)
                .then_with(|| a.registration.id.cmp(&b.registration.id))
        });
        let pagination = query.events.pagination;
        Ok(page(rows, pagination.offset(), pagination.limit()))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.state.lock().await.users.get(id).cloned())
    }

    async fn roles(&self, user_id: &Uuid) -> Result<Vec<Role>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.roles.iter().filter(|r| &r.user_id == user_id).cloned().collect())
    }

    async fn badges(&self, user_id: &Uuid) -> Result<Vec<Badge>, DomainError> {
        Ok(self.state.lock().await.badges_of(user_id))
    }

    async fn list_badges(&self, query: &BadgeQuery) -> Result<(Vec<BadgeRow>, u64), DomainError> {
        let state = self.state.lock().await;
        let mut rows: Vec<BadgeRow> = state
            .badges
            .values()
            .map(|badge| BadgeRow {
                badge: badge.clone(),
                user_full_name: state
                    .users
                    .get(&badge.user_id)
                    .map(User::full_name)
                    .unwrap_or_default(),
                activity_name: badge
                    .activity_id
                    .and_then(|id| state.activity_types.get(&id))
                    .map(|a| a.name.clone()),
            })
            .filter(|row| query.matches(row))
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));
        Ok(page(rows, query.pagination.offset(), query.pagination.limit()))
    }
}

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn find_event_type(&self, id: &Uuid) -> Result<Option<EventType>, DomainError> {
        Ok(self.state.lock().await.event_types.get(id).cloned())
    }

    async fn find_activity_types(&self, ids: &[Uuid]) -> Result<Vec<ActivityType>, DomainError> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.activity_types.get(id).cloned()).collect())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<User>, DomainError> {
        let state = self.state.lock().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn roles_of_users(&self, ids: &[Uuid]) -> Result<Vec<Role>, DomainError> {
        let state = self.state.lock().await;
        Ok(state.roles.iter().filter(|r| ids.contains(&r.user_id)).cloned().collect())
    }
}
