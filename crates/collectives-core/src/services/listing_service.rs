// ============================================================================
// Collectives Core - Listing Service
// File: crates/collectives-core/src/services/listing_service.rs
// Description: Read-only listings composed with the visibility filter
// ============================================================================

use std::sync::Arc;

use collectives_shared::Page;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::access;
use crate::catalog::ActivityScope;
use crate::context::RequestContext;
use crate::domain::Event;
use crate::error::DomainError;
use crate::listing::{badges::BadgeRow, BadgeQuery, EventQuery, ListingParams, UserEventQuery};
use crate::predicate::EventPredicate;
use crate::repositories::{EventRepository, UserEventRow, UserRepository};
use crate::visibility::visibility_predicate;

pub struct ListingService<E: EventRepository + ?Sized, R: UserRepository + ?Sized> {
    event_repo: Arc<E>,
    user_repo: Arc<R>,
}

impl<E: EventRepository + ?Sized, R: UserRepository + ?Sized> ListingService<E, R> {
    pub fn new(event_repo: Arc<E>, user_repo: Arc<R>) -> Self {
        Self { event_repo, user_repo }
    }

    pub async fn list_events(
        &self,
        ctx: &RequestContext,
        params: &ListingParams,
    ) -> Result<Page<Event>, DomainError> {
        let query = EventQuery::from_params(params)?.restrict(visibility_predicate(ctx));
        self.fetch_events(query).await
    }

    /// Events led by `leader_id`, as the caller is allowed to see them.
    pub async fn list_leader_events(
        &self,
        ctx: &RequestContext,
        leader_id: &Uuid,
        params: &ListingParams,
    ) -> Result<Page<Event>, DomainError> {
        let query = EventQuery::from_params(params)?
            .restrict(EventPredicate::LedBy(*leader_id))
            .restrict(visibility_predicate(ctx));
        self.fetch_events(query).await
    }

    /// Events `target_user` registered to. Members see their own; reading
    /// someone else's needs a role.
    pub async fn list_user_events(
        &self,
        ctx: &RequestContext,
        target_user: &Uuid,
        params: &ListingParams,
    ) -> Result<Page<UserEventRow>, DomainError> {
        let caps = ctx.require_member()?;
        if caps.user_id != *target_user && !access::may_read_other_users(&ctx.caller) {
            warn!(caller = %caps.user_id, target = %target_user, "user events listing refused");
            return Err(DomainError::not_permitted("cannot list another member's events"));
        }

        let mut query = UserEventQuery::from_params(params)?;
        query.events = query.events.restrict(visibility_predicate(ctx));
        let pagination = query.events.pagination;
        let (rows, total) = self
            .event_repo
            .list_for_user(target_user, &query)
            .await
            .map_err(DomainError::into_listing_error)?;
        Ok(Page::new(rows, pagination, total))
    }

    /// Badges of the activities the caller supervises; hotline sees all of them.
    pub async fn list_badges(
        &self,
        ctx: &RequestContext,
        params: &ListingParams,
    ) -> Result<Page<BadgeRow>, DomainError> {
        let caps = ctx.require_member()?;
        let scope = if caps.is_hotline() {
            ActivityScope::All
        } else {
            caps.supervised_activities()
        };
        if scope.is_empty() {
            return Err(DomainError::not_permitted("badge listing needs hotline or supervisor rights"));
        }

        let query = BadgeQuery::from_params(params, scope)?;
        let pagination = query.pagination;
        let (rows, total) = self
            .user_repo
            .list_badges(&query)
            .await
            .map_err(DomainError::into_listing_error)?;
        Ok(Page::new(rows, pagination, total))
    }

    pub async fn event_visible_to(&self, ctx: &RequestContext, event_id: &Uuid) -> Result<bool, DomainError> {
        let event = self
            .event_repo
            .find_by_id(event_id)
            .await
            .map_err(DomainError::into_listing_error)?
            .ok_or_else(|| DomainError::not_found("event", event_id))?;
        Ok(access::may_view(ctx, &event))
    }

    async fn fetch_events(&self, query: EventQuery) -> Result<Page<Event>, DomainError> {
        debug!(predicate = ?query.predicate, sort = ?query.sort, "event listing");
        let pagination = query.pagination;
        let (events, total) = self
            .event_repo
            .list(&query)
            .await
            .map_err(DomainError::into_listing_error)?;
        Ok(Page::new(events, pagination, total))
    }
}
