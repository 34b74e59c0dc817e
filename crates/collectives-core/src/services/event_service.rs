// ============================================================================
// Collectives Core - Event Service
// File: crates/collectives-core/src/services/event_service.rs
// ============================================================================
//! Event creation and editing

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::access;
use crate::capacity::Capacity;
use crate::catalog::Capabilities;
use crate::context::RequestContext;
use crate::domain::{Event, EventStatus, EventVisibility, LeaderRef};
use crate::error::DomainError;
use crate::promoter::promote_waiting_list;
use crate::repositories::{CatalogRepository, UnitOfWork};

/// Editable fields of an event, as submitted
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EventDraft {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: String,
    #[serde(default)]
    pub description: String,

    pub start: NaiveDateTime,
    pub end: NaiveDateTime,

    #[validate(range(min = 0))]
    pub num_slots: i32,
    #[validate(range(min = 0))]
    pub num_online_slots: i32,
    #[validate(range(min = 0))]
    pub num_waiting_list: i32,
    #[serde(default)]
    pub include_leaders_in_counts: bool,

    pub registration_open: NaiveDateTime,
    pub registration_close: NaiveDateTime,

    #[serde(default)]
    pub status: EventStatus,
    #[serde(default)]
    pub visibility: EventVisibility,
    #[serde(default)]
    pub requires_payment: bool,

    pub event_type_id: Uuid,
    #[serde(default)]
    pub activity_type_ids: Vec<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1, message = "An event needs at least one leader"))]
    pub leader_ids: Vec<Uuid>,
    pub main_leader_id: Option<Uuid>,
}

pub struct EventService<U: UnitOfWork + ?Sized, C: CatalogRepository + ?Sized> {
    uow: Arc<U>,
    catalog: Arc<C>,
}

impl<U: UnitOfWork + ?Sized, C: CatalogRepository + ?Sized> EventService<U, C> {
    pub fn new(uow: Arc<U>, catalog: Arc<C>) -> Self {
        Self { uow, catalog }
    }

    pub async fn create_event(&self, ctx: &RequestContext, draft: EventDraft) -> Result<Event, DomainError> {
        ctx.require_member()?;
        if !access::may_create_events(&ctx.caller) {
            warn!(caller = ?ctx.caller.user_id(), "event creation refused");
            return Err(DomainError::not_permitted("caller may not create events"));
        }

        let event = self.build(collectives_shared::new_id(), draft).await?;
        let mut tx = self.uow.begin().await?;
        tx.insert_event(&event).await?;
        tx.commit().await?;

        info!(event_id = %event.id, title = %event.title, "event created");
        Ok(event)
    }

    /// Replaces the editable fields. Added slots are offered to the waiting list.
    ///
    /// Slots and waiting places cannot shrink below the registrations already
    /// holding them; waiters promoted by the edit no longer count as waiting.
    pub async fn update_event(
        &self,
        ctx: &RequestContext,
        event_id: &Uuid,
        draft: EventDraft,
    ) -> Result<Event, DomainError> {
        ctx.require_member()?;
        let updated = self.build(*event_id, draft).await?;

        let mut tx = self.uow.begin().await?;
        let current = tx
            .lock_event(event_id)
            .await?
            .ok_or_else(|| DomainError::not_found("event", event_id))?;
        if !access::may_edit(&ctx.caller, &current) {
            warn!(event_id = %event_id, caller = ?ctx.caller.user_id(), "event update refused");
            return Err(DomainError::not_permitted("caller may not edit this event"));
        }

        let registrations = tx.event_registrations(event_id).await?;
        let capacity = Capacity::compute(&updated, &registrations);
        if capacity.effective_slots < capacity.holding {
            return Err(DomainError::Validation(format!(
                "{} registrations already hold a slot",
                capacity.holding
            )));
        }

        tx.update_event(&updated).await?;
        let promoted = promote_waiting_list(tx.as_mut(), &updated, ctx.now).await?;
        let still_waiting = capacity.waiting - promoted.len() as i64;
        if capacity.num_waiting_list < still_waiting {
            return Err(DomainError::Validation(format!(
                "{} registrations are already on the waiting list",
                still_waiting
            )));
        }
        tx.commit().await?;

        info!(event_id = %event_id, promoted = promoted.len(), "event updated");
        Ok(updated)
    }

    /// Resolves the references of `draft` and checks every event invariant.
    async fn build(&self, id: Uuid, draft: EventDraft) -> Result<Event, DomainError> {
        draft.validate()?;

        let event_type = self
            .catalog
            .find_event_type(&draft.event_type_id)
            .await?
            .ok_or_else(|| DomainError::not_found("event type", draft.event_type_id))?;

        let activity_types = self.catalog.find_activity_types(&draft.activity_type_ids).await?;
        if let Some(missing) = draft
            .activity_type_ids
            .iter()
            .find(|id| !activity_types.iter().any(|a| &a.id == *id))
        {
            return Err(DomainError::not_found("activity type", missing));
        }

        let users = self.catalog.find_users(&draft.leader_ids).await?;
        let mut leaders = Vec::with_capacity(draft.leader_ids.len());
        for leader_id in &draft.leader_ids {
            let user = users
                .iter()
                .find(|u| &u.id == leader_id)
                .ok_or_else(|| DomainError::not_found("user", leader_id))?;
            if !leaders.iter().any(|l: &LeaderRef| l.id == user.id) {
                leaders.push(LeaderRef { id: user.id, full_name: user.full_name() });
            }
        }
        let roles = self.catalog.roles_of_users(&draft.leader_ids).await?;

        let event = Event {
            id,
            title: draft.title.trim().to_string(),
            description: draft.description,
            start: draft.start,
            end: draft.end,
            num_slots: draft.num_slots,
            num_online_slots: draft.num_online_slots,
            num_waiting_list: draft.num_waiting_list,
            include_leaders_in_counts: draft.include_leaders_in_counts,
            registration_open: draft.registration_open,
            registration_close: draft.registration_close,
            status: draft.status,
            visibility: draft.visibility,
            requires_payment: draft.requires_payment,
            event_type,
            activity_types,
            tags: draft.tags,
            leaders,
            main_leader_id: draft.main_leader_id.or_else(|| draft.leader_ids.first().copied()),
        };

        event.validate_invariants(|leader, activity| {
            Capabilities::from_roles(*leader, &roles).can_lead(activity)
        })?;
        Ok(event)
    }
}
