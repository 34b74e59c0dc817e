//! Shared fixtures for service-level tests over the in-memory store

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use collectives_core::catalog::Caller;
use collectives_core::domain::{
    ActivityKind, ActivityType, Event, EventStatus, EventType, EventVisibility, LeaderRef, Role,
    RoleKind, User, UserType,
};
use collectives_core::memory::InMemoryStore;
use collectives_core::oracle::DisabledOracle;
use collectives_core::services::{CallerService, ListingService, RegistrationService};
use collectives_core::RequestContext;
use collectives_shared::ClubSettings;
use uuid::Uuid;

static LICENSE_SEQ: AtomicU64 = AtomicU64::new(1);

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
}

/// Reference "now" of the scenarios, inside every registration window.
pub fn now() -> NaiveDateTime {
    at(2026, 10, 16, 9, 0)
}

pub fn activity(short_name: &str) -> ActivityType {
    ActivityType {
        id: Uuid::new_v4(),
        short_name: short_name.to_string(),
        name: short_name.to_uppercase(),
        kind: ActivityKind::Activity,
        deprecated: false,
    }
}

pub fn collective_type() -> EventType {
    EventType {
        id: Uuid::new_v4(),
        short_name: "collective".into(),
        name: "Collective".into(),
        requires_activity: true,
    }
}

pub struct World {
    pub store: Arc<InMemoryStore>,
    pub registrations: Arc<RegistrationService<InMemoryStore, DisabledOracle>>,
    pub listings: ListingService<InMemoryStore, InMemoryStore>,
    pub callers: CallerService<InMemoryStore>,
    pub settings: Arc<ClubSettings>,
    pub alpi: ActivityType,
    pub event_type: EventType,
    pub leader: User,
}

impl World {
    pub async fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let alpi = activity("alpi");
        store.add_activity_type(alpi.clone()).await;
        let event_type = collective_type();
        store.add_event_type(event_type.clone()).await;

        let world = Self {
            registrations: Arc::new(RegistrationService::new(store.clone(), Arc::new(DisabledOracle))),
            listings: ListingService::new(store.clone(), store.clone()),
            callers: CallerService::new(store.clone()),
            settings: Arc::new(ClubSettings::default()),
            store,
            alpi,
            event_type,
            leader: placeholder_user(),
        };
        let leader = world.member("Ada").await;
        world.grant(&leader, RoleKind::EventLeader, Some(world.alpi.id)).await;
        Self { leader, ..world }
    }

    /// Licensed extranet member, license valid until autumn 2027.
    pub async fn member(&self, first_name: &str) -> User {
        let seq = LICENSE_SEQ.fetch_add(1, Ordering::SeqCst);
        let user = User::new(
            format!("{}.{}@example.org", first_name.to_lowercase(), seq),
            format!("74{:010}", seq),
            first_name.to_string(),
            "Member".to_string(),
            UserType::Extranet,
            NaiveDate::from_ymd_opt(2027, 10, 1),
        )
        .unwrap();
        self.store.add_user(user.clone()).await.unwrap();
        user
    }

    pub async fn grant(&self, user: &User, kind: RoleKind, activity: Option<Uuid>) {
        self.store.add_role(Role::new(user.id, kind, activity).unwrap()).await.unwrap();
    }

    /// Confirmed external outing on 2026-11-14, registration open from
    /// 2026-10-01 to 2026-11-12 20:00.
    pub fn outing(&self, num_slots: i32, num_online_slots: i32, num_waiting_list: i32) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: "Aiguille du Moine".into(),
            description: String::new(),
            start: at(2026, 11, 14, 7, 0),
            end: at(2026, 11, 14, 18, 0),
            num_slots,
            num_online_slots,
            num_waiting_list,
            include_leaders_in_counts: false,
            registration_open: at(2026, 10, 1, 0, 0),
            registration_close: at(2026, 11, 12, 20, 0),
            status: EventStatus::Confirmed,
            visibility: EventVisibility::External,
            requires_payment: false,
            event_type: self.event_type.clone(),
            activity_types: vec![self.alpi.clone()],
            tags: vec![],
            leaders: vec![LeaderRef { id: self.leader.id, full_name: self.leader.full_name() }],
            main_leader_id: Some(self.leader.id),
        }
    }

    pub async fn add_event(&self, event: Event) -> Event {
        self.store.add_event(event.clone()).await;
        event
    }

    /// Context of `user` as the HTTP layer would build it.
    pub async fn ctx(&self, user: &User, now: NaiveDateTime) -> RequestContext {
        let caller = self.callers.resolve(Some(user.id), now).await.unwrap();
        RequestContext::new(caller, now, self.settings.clone())
    }

    pub fn anonymous(&self, now: NaiveDateTime) -> RequestContext {
        RequestContext::new(Caller::Anonymous, now, self.settings.clone())
    }
}

fn placeholder_user() -> User {
    User::new(
        "placeholder@example.org".into(),
        "000000000000".into(),
        "Place".into(),
        "Holder".into(),
        UserType::Local,
        None,
    )
    .unwrap()
}
