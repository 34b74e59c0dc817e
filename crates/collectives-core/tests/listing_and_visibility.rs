//! Event listings composed with the visibility filter

mod common;

use std::sync::Arc;

use chrono::Duration;
use collectives_core::catalog::{Caller, Capabilities};
use collectives_core::domain::{
    BadgeKind, Event, EventStatus, EventVisibility, Registration, RegistrationStatus, Role, RoleKind,
};
use collectives_core::listing::ListingParams;
use collectives_core::repositories::EventRepository;
use collectives_core::services::{EventDraft, EventService};
use collectives_core::visibility::visibility_predicate;
use collectives_core::{Badge, DomainError, RequestContext};
use collectives_shared::ClubSettings;
use common::*;
use proptest::prelude::*;
use uuid::Uuid;

fn params(pairs: &[(&str, &str)]) -> ListingParams {
    ListingParams::from_pairs(pairs.iter().map(|(k, v)| (*k, v.to_string())))
}

fn ids(events: &[Event]) -> Vec<Uuid> {
    events.iter().map(|e| e.id).collect()
}

#[tokio::test]
async fn test_pending_activity_event_visibility() {
    let world = World::new().await;
    let a1 = world.alpi.clone();
    let a2 = activity("ski");
    world.store.add_activity_type(a2.clone()).await;

    let mut hidden = world.outing(4, 4, 0);
    hidden.status = EventStatus::Pending;
    hidden.visibility = EventVisibility::Activity;
    let hidden = world.add_event(hidden).await;

    let c2 = world.member("C2").await;
    world.grant(&c2, RoleKind::EventLeader, Some(a2.id)).await;
    let c3 = world.member("C3").await;
    world.grant(&c3, RoleKind::ActivitySupervisor, Some(a1.id)).await;
    let c4 = world.member("C4").await;
    world.grant(&c4, RoleKind::Moderator, None).await;

    let all = ListingParams::default();
    let anonymous = world.anonymous(now());
    let page = world.listings.list_events(&anonymous, &all).await.unwrap();
    assert!(!ids(&page.data).contains(&hidden.id));

    let expectations = [(&c2, false), (&c3, true), (&c4, true)];
    for (user, visible) in expectations {
        let ctx = world.ctx(user, now()).await;
        let page = world.listings.list_events(&ctx, &all).await.unwrap();
        assert_eq!(ids(&page.data).contains(&hidden.id), visible, "{}", user.first_name);
        assert_eq!(world.listings.event_visible_to(&ctx, &hidden.id).await.unwrap(), visible);
    }
    assert!(!world.listings.event_visible_to(&anonymous, &hidden.id).await.unwrap());
}

#[tokio::test]
async fn test_anonymous_history_horizon() {
    let world = World::new().await;
    let mut old = world.outing(4, 4, 0);
    old.start = now() - Duration::days(45);
    old.end = old.start + Duration::hours(8);
    old.registration_open = old.start - Duration::days(20);
    old.registration_close = old.start - Duration::days(1);
    let old = world.add_event(old).await;
    let current = world.add_event(world.outing(4, 4, 0)).await;

    let page = world.listings.list_events(&world.anonymous(now()), &ListingParams::default()).await.unwrap();
    assert_eq!(ids(&page.data), vec![current.id]);

    let member = world.member("Hist").await;
    let ctx = world.ctx(&member, now()).await;
    let page = world.listings.list_events(&ctx, &ListingParams::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert!(ids(&page.data).contains(&old.id));
}

#[tokio::test]
async fn test_filters_sorting_and_pagination() {
    let world = World::new().await;
    let mut created = Vec::new();
    for (i, title) in ["Dent Blanche", "Grand Paradis", "Dent d'Hérens"].into_iter().enumerate() {
        let mut event = world.outing(4, 4, 0);
        event.title = title.to_string();
        event.start += Duration::days(i as i64);
        event.end += Duration::days(i as i64);
        event.tags = vec![if i == 1 { "beginner".into() } else { "alpine".into() }];
        created.push(world.add_event(event).await);
    }
    let ctx = world.anonymous(now());

    let page = world
        .listings
        .list_events(&ctx, &params(&[
            ("filters[0][field]", "title"),
            ("filters[0][type]", "like"),
            ("filters[0][value]", "dent"),
            ("sorters[0][field]", "start"),
            ("sorters[0][dir]", "desc"),
            ("size", "1"),
        ]))
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.last_page, 2);
    assert_eq!(ids(&page.data), vec![created[2].id]);

    let page = world
        .listings
        .list_events(&ctx, &params(&[
            ("filters[0][field]", "tags"),
            ("filters[0][value]", "beginner"),
            ("filters[1][field]", "favourite_colour"),
            ("filters[1][value]", "blue"),
        ]))
        .await
        .unwrap();
    assert_eq!(ids(&page.data), vec![created[1].id]);

    let bad = world
        .listings
        .list_events(&ctx, &params(&[("filters[0][field]", "end"), ("filters[0][value]", "soon")]))
        .await;
    assert!(matches!(bad, Err(DomainError::BadRequest(_))));
}

#[tokio::test]
async fn test_leader_and_user_event_listings() {
    let world = World::new().await;
    let led = world.add_event(world.outing(4, 4, 0)).await;
    let other_leader = world.member("Other").await;
    world.grant(&other_leader, RoleKind::EventLeader, Some(world.alpi.id)).await;
    let mut other = world.outing(4, 4, 0);
    other.leaders[0].id = other_leader.id;
    other.main_leader_id = Some(other_leader.id);
    // A week later, so both outings can be joined
    other.start += Duration::days(7);
    other.end += Duration::days(7);
    let other = world.add_event(other).await;

    let member = world.member("Lister").await;
    let ctx = world.ctx(&member, now()).await;
    let page = world.listings.list_leader_events(&ctx, &world.leader.id, &ListingParams::default()).await.unwrap();
    assert_eq!(ids(&page.data), vec![led.id]);

    world.registrations.self_register(&ctx, &led.id).await.unwrap();
    let reg = world.registrations.self_register(&ctx, &other.id).await.unwrap();
    world.registrations.cancel(&ctx, &reg.id).await.unwrap();

    let page = world
        .listings
        .list_user_events(&ctx, &member.id, &params(&[
            ("filters[0][field]", "registration.status"),
            ("filters[0][value]", "self_registered"),
        ]))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].event.id, led.id);

    // Another plain member may not look
    let nosy = world.member("Nosy").await;
    let nosy_ctx = world.ctx(&nosy, now()).await;
    assert!(matches!(
        world.listings.list_user_events(&nosy_ctx, &member.id, &ListingParams::default()).await,
        Err(DomainError::NotPermitted(_))
    ));
    // A leader may
    let leader_ctx = world.ctx(&world.leader, now()).await;
    let page = world.listings.list_user_events(&leader_ctx, &member.id, &ListingParams::default()).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_badge_listing_scope() {
    let world = World::new().await;
    let skier = world.member("Skier").await;
    let competency = Badge::new(
        skier.id,
        BadgeKind::Competency { level: 3 },
        Some(world.alpi.id),
        at(2027, 9, 30, 0, 0).date(),
        now(),
    )
    .unwrap();
    world.store.add_badge(competency.clone()).await;
    let volunteer = Badge::new(skier.id, BadgeKind::Volunteer, None, at(2027, 9, 30, 0, 0).date(), now()).unwrap();
    world.store.add_badge(volunteer).await;

    let supervisor = world.member("Sup").await;
    world.grant(&supervisor, RoleKind::ActivitySupervisor, Some(world.alpi.id)).await;
    let ctx = world.ctx(&supervisor, now()).await;
    let page = world.listings.list_badges(&ctx, &ListingParams::default()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].badge.id, competency.id);
    assert_eq!(page.data[0].activity_name.as_deref(), Some("ALPI"));

    let hotline = world.member("Hot").await;
    world.grant(&hotline, RoleKind::Hotline, None).await;
    let ctx = world.ctx(&hotline, now()).await;
    let page = world.listings.list_badges(&ctx, &ListingParams::default()).await.unwrap();
    assert_eq!(page.total, 2);

    let ctx = world.ctx(&skier, now()).await;
    assert!(matches!(
        world.listings.list_badges(&ctx, &ListingParams::default()).await,
        Err(DomainError::NotPermitted(_))
    ));
}

fn draft(world: &World) -> EventDraft {
    let event = world.outing(6, 4, 2);
    EventDraft {
        title: "Pointe Percée".into(),
        description: "Normal route".into(),
        start: event.start,
        end: event.end,
        num_slots: 6,
        num_online_slots: 1,
        num_waiting_list: 2,
        include_leaders_in_counts: false,
        registration_open: event.registration_open,
        registration_close: event.registration_close,
        status: EventStatus::Confirmed,
        visibility: EventVisibility::External,
        requires_payment: false,
        event_type_id: world.event_type.id,
        activity_type_ids: vec![world.alpi.id],
        tags: vec![],
        leader_ids: vec![world.leader.id],
        main_leader_id: None,
    }
}

#[tokio::test]
async fn test_create_and_update_event() {
    let world = World::new().await;
    let events = EventService::new(world.store.clone(), world.store.clone());
    let leader_ctx = world.ctx(&world.leader, now()).await;

    let member = world.member("NoRole").await;
    let member_ctx = world.ctx(&member, now()).await;
    assert!(matches!(
        events.create_event(&member_ctx, draft(&world)).await,
        Err(DomainError::NotPermitted(_))
    ));

    let mut invalid = draft(&world);
    invalid.leader_ids = vec![member.id];
    assert!(matches!(
        events.create_event(&leader_ctx, invalid).await,
        Err(DomainError::Validation(_))
    ));
    let mut inverted = draft(&world);
    inverted.end = inverted.start - Duration::hours(1);
    assert!(matches!(
        events.create_event(&leader_ctx, inverted).await,
        Err(DomainError::Validation(_))
    ));

    let event = events.create_event(&leader_ctx, draft(&world)).await.unwrap();
    assert_eq!(event.main_leader_id, Some(world.leader.id));

    let first = world.member("First").await;
    let second = world.member("Second").await;
    let ctx = world.ctx(&first, now()).await;
    world.registrations.self_register(&ctx, &event.id).await.unwrap();
    let ctx = world.ctx(&second, now()).await;
    let waiting = world.registrations.self_register(&ctx, &event.id).await.unwrap();
    assert_eq!(waiting.status, RegistrationStatus::WaitingList);

    // Opening a second online slot promotes the waiter
    let mut wider = draft(&world);
    wider.num_online_slots = 2;
    assert!(matches!(
        events.update_event(&member_ctx, &event.id, wider.clone()).await,
        Err(DomainError::NotPermitted(_))
    ));
    let updated = events.update_event(&leader_ctx, &event.id, wider).await.unwrap();
    assert_eq!(updated.num_online_slots, 2);
    let promoted = world.store.registration(&waiting.id).await.unwrap();
    assert_eq!(promoted.status, RegistrationStatus::SelfRegistered);
}

#[tokio::test]
async fn test_update_cannot_shrink_below_registrations() {
    let world = World::new().await;
    let events = EventService::new(world.store.clone(), world.store.clone());
    let leader_ctx = world.ctx(&world.leader, now()).await;

    let mut roomy = draft(&world);
    roomy.num_online_slots = 4;
    let event = events.create_event(&leader_ctx, roomy.clone()).await.unwrap();
    for name in ["One", "Two", "Three"] {
        let member = world.member(name).await;
        let ctx = world.ctx(&member, now()).await;
        world.registrations.self_register(&ctx, &event.id).await.unwrap();
    }

    let mut single = roomy.clone();
    single.num_slots = 1;
    single.num_online_slots = 1;
    assert!(matches!(
        events.update_event(&leader_ctx, &event.id, single).await,
        Err(DomainError::Validation(_))
    ));
    let stored = world.store.find_by_id(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.num_slots, 6);

    // Three holders fit in three slots exactly
    let mut tight = roomy.clone();
    tight.num_slots = 3;
    tight.num_online_slots = 3;
    let updated = events.update_event(&leader_ctx, &event.id, tight.clone()).await.unwrap();
    assert_eq!(updated.num_slots, 3);

    // Two waiters cannot fit in a one-place waiting list
    for name in ["Four", "Five"] {
        let member = world.member(name).await;
        let ctx = world.ctx(&member, now()).await;
        let reg = world.registrations.self_register(&ctx, &event.id).await.unwrap();
        assert_eq!(reg.status, RegistrationStatus::WaitingList);
    }
    let mut short_list = tight.clone();
    short_list.num_waiting_list = 1;
    assert!(matches!(
        events.update_event(&leader_ctx, &event.id, short_list.clone()).await,
        Err(DomainError::Validation(_))
    ));

    // Unless the same edit promotes one of them
    short_list.num_slots = 4;
    short_list.num_online_slots = 4;
    events.update_event(&leader_ctx, &event.id, short_list).await.unwrap();
    let regs = world.store.event_registrations(&event.id).await;
    assert_eq!(regs.iter().filter(|r| r.status.is_waiting()).count(), 1);
}

#[tokio::test]
async fn test_unknown_or_lapsed_caller() {
    let world = World::new().await;
    assert_eq!(
        world.callers.resolve(Some(Uuid::new_v4()), now()).await,
        Err(DomainError::NotAuthenticated)
    );

    let lapsed = world.member("Lapsed").await;
    world.grant(&lapsed, RoleKind::Moderator, None).await;
    let after_expiry = at(2027, 10, 2, 9, 0);
    let caller = world.callers.resolve(Some(lapsed.id), after_expiry).await.unwrap();
    assert_eq!(caller, Caller::Member(Capabilities::empty(lapsed.id)));
}

// Privilege monotonicity of the visibility filter

const POOL: usize = 6;

fn role_pool(user: Uuid, activities: &[Uuid; 3]) -> Vec<Role> {
    vec![
        Role::new(user, RoleKind::EventLeader, Some(activities[0])).unwrap(),
        Role::new(user, RoleKind::ActivitySupervisor, Some(activities[1])).unwrap(),
        Role::new(user, RoleKind::Trainee, Some(activities[2])).unwrap(),
        Role::new(user, RoleKind::Hotline, None).unwrap(),
        Role::new(user, RoleKind::President, None).unwrap(),
        Role::new(user, RoleKind::Moderator, None).unwrap(),
    ]
}

fn pick(roles: &[Role], mask: &[bool]) -> Vec<Role> {
    roles.iter().zip(mask).filter(|(_, keep)| **keep).map(|(r, _)| r.clone()).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_visibility_is_monotone_in_privileges(
        status in 0usize..3,
        visibility in 0usize..3,
        event_activities in proptest::collection::vec(any::<bool>(), 3),
        caller_leads in any::<bool>(),
        ended_days_ago in -10i64..90,
        lower in proptest::collection::vec(any::<bool>(), POOL),
        extra in proptest::collection::vec(any::<bool>(), POOL),
    ) {
        let settings = Arc::new(ClubSettings::default());
        let activities = [activity("a1"), activity("a2"), activity("a3")];
        let ids = [activities[0].id, activities[1].id, activities[2].id];
        let user = Uuid::new_v4();

        let world_event = {
            let mut event = Event {
                id: Uuid::new_v4(),
                title: "Generated".into(),
                description: String::new(),
                start: now() - Duration::days(ended_days_ago) - Duration::hours(8),
                end: now() - Duration::days(ended_days_ago),
                num_slots: 4,
                num_online_slots: 4,
                num_waiting_list: 0,
                include_leaders_in_counts: false,
                registration_open: now() - Duration::days(120),
                registration_close: now() - Duration::days(100),
                status: [EventStatus::Pending, EventStatus::Confirmed, EventStatus::Cancelled][status],
                visibility: [EventVisibility::External, EventVisibility::Licensed, EventVisibility::Activity][visibility],
                requires_payment: false,
                event_type: collective_type(),
                activity_types: activities
                    .iter()
                    .zip(&event_activities)
                    .filter(|(_, on)| **on)
                    .map(|(a, _)| a.clone())
                    .collect(),
                tags: vec![],
                leaders: vec![],
                main_leader_id: None,
            };
            if caller_leads {
                event.leaders.push(collectives_core::LeaderRef { id: user, full_name: "Self".into() });
            }
            event
        };

        let pool = role_pool(user, &ids);
        let lower_roles = pick(&pool, &lower);
        let higher_mask: Vec<bool> = lower.iter().zip(&extra).map(|(a, b)| *a || *b).collect();
        let higher_roles = pick(&pool, &higher_mask);

        let anonymous = RequestContext::new(Caller::Anonymous, now(), settings.clone());
        let low = RequestContext::new(Caller::Member(Capabilities::from_roles(user, &lower_roles)), now(), settings.clone());
        let high = RequestContext::new(Caller::Member(Capabilities::from_roles(user, &higher_roles)), now(), settings);

        let seen_by = |ctx: &RequestContext| visibility_predicate(ctx).matches(&world_event);
        if seen_by(&anonymous) {
            prop_assert!(seen_by(&low));
        }
        if seen_by(&low) {
            prop_assert!(seen_by(&high));
        }
    }
}

#[tokio::test]
async fn test_promotion_requires_license_at_event_end() {
    let world = World::new().await;
    let event = world.add_event(world.outing(1, 1, 1)).await;
    let holder = world.member("Holder").await;
    let ctx = world.ctx(&holder, now()).await;
    let held = world.registrations.self_register(&ctx, &event.id).await.unwrap();

    // Waiter whose license lapses before the outing, queued by hand
    let mut expiring = world.member("Expiring").await;
    expiring.license_expiry_date = Some(at(2026, 11, 1, 0, 0).date());
    expiring.id = Uuid::new_v4();
    expiring.mail = "expiring.other@example.org".into();
    expiring.license = "749999999999".into();
    world.store.add_user(expiring.clone()).await.unwrap();
    let queued = Registration::new(expiring.id, event.id, RegistrationStatus::WaitingList, true, now());
    world.store.add_registration(queued.clone()).await.unwrap();

    world.registrations.cancel(&ctx, &held.id).await.unwrap();
    let still = world.store.registration(&queued.id).await.unwrap();
    assert_eq!(still.status, RegistrationStatus::WaitingList);
}
