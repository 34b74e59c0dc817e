//! Router tests over the in-memory store

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Method, Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use collectives_api::rate_limit::RegistrationLimiter;
use collectives_api::state::Backend;
use collectives_api::{router, AppState};
use collectives_core::domain::{
    ActivityKind, ActivityType, Event, EventStatus, EventType, EventVisibility, LeaderRef, Role,
    RoleKind, User, UserType,
};
use collectives_core::memory::InMemoryStore;
use collectives_core::oracle::DisabledOracle;
use collectives_core::FixedClock;
use collectives_security::JwtService;
use collectives_shared::ClubSettings;

const SECRET: &str = "router-test-secret-at-least-32-bytes";

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

struct Harness {
    app: Router,
    jwt: JwtService,
    member: User,
    event: Event,
}

fn user(first_name: &str, license: &str) -> User {
    User::new(
        format!("{}@example.org", first_name.to_lowercase()),
        license.to_string(),
        first_name.to_string(),
        "Member".to_string(),
        UserType::Extranet,
        NaiveDate::from_ymd_opt(2027, 10, 1),
    )
    .unwrap()
}

async fn harness(registrations_per_minute: u32) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let alpi = ActivityType {
        id: Uuid::new_v4(),
        short_name: "alpi".into(),
        name: "Alpinisme".into(),
        kind: ActivityKind::Activity,
        deprecated: false,
    };
    let event_type = EventType {
        id: Uuid::new_v4(),
        short_name: "collective".into(),
        name: "Collective".into(),
        requires_activity: true,
    };
    store.add_activity_type(alpi.clone()).await;
    store.add_event_type(event_type.clone()).await;

    let leader = user("Ada", "740000000101");
    let member = user("Bob", "740000000102");
    store.add_user(leader.clone()).await.unwrap();
    store.add_user(member.clone()).await.unwrap();
    store
        .add_role(Role::new(leader.id, RoleKind::EventLeader, Some(alpi.id)).unwrap())
        .await
        .unwrap();

    let event = Event {
        id: Uuid::new_v4(),
        title: "Aiguille du Moine".into(),
        description: String::new(),
        start: at(2026, 11, 14, 7),
        end: at(2026, 11, 14, 18),
        num_slots: 4,
        num_online_slots: 2,
        num_waiting_list: 2,
        include_leaders_in_counts: false,
        registration_open: at(2026, 10, 1, 0),
        registration_close: at(2026, 11, 12, 20),
        status: EventStatus::Confirmed,
        visibility: EventVisibility::External,
        requires_payment: false,
        event_type,
        activity_types: vec![alpi],
        tags: vec![],
        leaders: vec![LeaderRef { id: leader.id, full_name: leader.full_name() }],
        main_leader_id: Some(leader.id),
    };
    store.add_event(event.clone()).await;

    let backend = Backend {
        uow: store.clone(),
        events: store.clone(),
        users: store.clone(),
        catalog: store,
        oracle: Arc::new(DisabledOracle),
    };
    let jwt = JwtService::new(SECRET.into(), 3600);
    let state = AppState::new(
        backend,
        jwt.clone(),
        Arc::new(FixedClock::new(at(2026, 10, 16, 9))),
        ClubSettings::default(),
        RegistrationLimiter::per_minute(registrations_per_minute),
    );
    Harness { app: router(state), jwt, member, event }
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let h = harness(10).await;
    let (status, body) = send(&h.app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_register_needs_a_member() {
    let h = harness(10).await;
    let uri = format!("/api/v1/events/{}/register", h.event.id);

    let (status, body) = send(&h.app, Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_AUTHENTICATED");

    let (status, _) = send(&h.app, Method::POST, &uri, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_self_registers() {
    let h = harness(10).await;
    let token = h.jwt.generate_access_token(&h.member.id).unwrap();
    let uri = format!("/api/v1/events/{}/register", h.event.id);

    let (status, body) = send(&h.app, Method::GET, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["placement"], "holding");

    let (status, body) = send(&h.app, Method::POST, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "self_registered");
    assert_eq!(body["data"]["user_id"], h.member.id.to_string());

    let listing = format!("/api/v1/users/{}/events", h.member.id);
    let (status, body) = send(&h.app, Method::GET, &listing, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let h = harness(10).await;
    let token = h.jwt.generate_access_token(&h.member.id).unwrap();
    let uri = format!("/api/v1/events/{}/register", Uuid::new_v4());
    let (status, body) = send(&h.app, Method::POST, &uri, Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_registration_commands_are_throttled() {
    let h = harness(1).await;
    let token = h.jwt.generate_access_token(&h.member.id).unwrap();
    let uri = format!("/api/v1/events/{}/register", h.event.id);

    let (first, _) = send(&h.app, Method::POST, &uri, Some(&token)).await;
    assert_eq!(first, StatusCode::CREATED);
    let (second, body) = send(&h.app, Method::POST, &uri, Some(&token)).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_event_listing_query_string() {
    let h = harness(10).await;
    let uri = "/api/v1/events?filters%5B0%5D%5Bfield%5D=title&filters%5B0%5D%5Btype%5D=like\
               &filters%5B0%5D%5Bvalue%5D=moine&sorters%5B0%5D%5Bfield%5D=start&page=1&size=10";
    let (status, body) = send(&h.app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["last_page"], 1);
    assert_eq!(body["data"]["data"][0]["title"], "Aiguille du Moine");

    let (status, body) = send(&h.app, Method::GET, "/api/v1/events?size=lots", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_visibility_check_and_badges_scope() {
    let h = harness(10).await;
    let uri = format!("/api/v1/events/{}/visible", h.event.id);
    let (status, body) = send(&h.app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["visible"], true);

    let token = h.jwt.generate_access_token(&h.member.id).unwrap();
    let (status, _) = send(&h.app, Method::GET, "/api/v1/badges", Some(&token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
