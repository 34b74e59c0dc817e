//! License refresh through the membership oracle during self-registration

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use collectives_core::domain::{EventStatus, RegistrationStatus};
use collectives_core::oracle::{LicenseValidity, MembershipOracle};
use collectives_core::services::RegistrationService;
use collectives_core::DomainError;
use common::*;

/// Oracle answering a fixed validity and counting lookups
struct StubOracle {
    answer: Result<LicenseValidity, DomainError>,
    calls: AtomicUsize,
}

impl StubOracle {
    fn valid_until(until: NaiveDate) -> Self {
        Self {
            answer: Ok(LicenseValidity {
                valid_from: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                valid_until: until,
            }),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            answer: Err(DomainError::ServiceUnavailable("registry down".into())),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl MembershipOracle for StubOracle {
    async fn check_license(&self, _license: &str) -> Result<LicenseValidity, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.clone()
    }
}

async fn expiring_member(world: &World) -> collectives_core::User {
    let user = world.member("Renewing").await;
    let mut expiring = user.clone();
    expiring.license_expiry_date = NaiveDate::from_ymd_opt(2026, 11, 1);
    // Separate account whose license ends before the outing
    expiring.id = collectives_shared::new_id();
    expiring.mail = format!("short.{}", user.mail);
    expiring.license = format!("75{}", &user.license[2..]);
    world.store.add_user(expiring.clone()).await.unwrap();
    expiring
}

#[tokio::test]
async fn test_renewed_license_is_persisted() {
    let world = World::new().await;
    let event = world.add_event(world.outing(4, 4, 0)).await;
    let oracle = Arc::new(StubOracle::valid_until(NaiveDate::from_ymd_opt(2027, 9, 30).unwrap()));
    let service = RegistrationService::new(world.store.clone(), oracle.clone());

    let user = expiring_member(&world).await;
    let ctx = world.ctx(&user, now()).await;
    let reg = service.self_register(&ctx, &event.id).await.unwrap();

    assert_eq!(reg.status, RegistrationStatus::SelfRegistered);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    let stored = world.store.user(&user.id).await.unwrap();
    assert_eq!(stored.license_expiry_date, NaiveDate::from_ymd_opt(2027, 10, 1));
}

#[tokio::test]
async fn test_oracle_not_asked_when_license_covers_event() {
    let world = World::new().await;
    let event = world.add_event(world.outing(4, 4, 0)).await;
    let oracle = Arc::new(StubOracle::failing());
    let service = RegistrationService::new(world.store.clone(), oracle.clone());

    let user = world.member("Covered").await;
    let ctx = world.ctx(&user, now()).await;
    service.self_register(&ctx, &event.id).await.unwrap();
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unreachable_oracle_fails_the_command() {
    let world = World::new().await;
    let event = world.add_event(world.outing(4, 4, 0)).await;
    let service = RegistrationService::new(world.store.clone(), Arc::new(StubOracle::failing()));

    let user = expiring_member(&world).await;
    let ctx = world.ctx(&user, now()).await;
    let result = service.self_register(&ctx, &event.id).await;

    assert!(matches!(result, Err(DomainError::ServiceUnavailable(_))));
    assert!(world.store.event_registrations(&event.id).await.is_empty());
}

#[tokio::test]
async fn test_unrenewed_license_is_refused() {
    let world = World::new().await;
    let event = world.add_event(world.outing(4, 4, 0)).await;
    // Federation still reports the season ending before the outing
    let oracle = Arc::new(StubOracle::valid_until(NaiveDate::from_ymd_opt(2026, 10, 31).unwrap()));
    let service = RegistrationService::new(world.store.clone(), oracle);

    let user = expiring_member(&world).await;
    let ctx = world.ctx(&user, now()).await;
    assert_eq!(
        service.self_register(&ctx, &event.id).await,
        Err(DomainError::LicenseExpired)
    );
}

#[tokio::test]
async fn test_event_refusals_come_before_the_oracle() {
    let world = World::new().await;
    let mut pending = world.outing(4, 4, 0);
    pending.status = EventStatus::Pending;
    let pending = world.add_event(pending).await;
    let mut closed = world.outing(4, 4, 0);
    closed.registration_close = now() - chrono::Duration::days(1);
    let closed = world.add_event(closed).await;
    let oracle = Arc::new(StubOracle::failing());
    let service = RegistrationService::new(world.store.clone(), oracle.clone());

    let user = expiring_member(&world).await;
    let ctx = world.ctx(&user, now()).await;
    assert!(matches!(
        service.self_register(&ctx, &pending.id).await,
        Err(DomainError::InvalidState(_))
    ));
    assert_eq!(
        service.self_register(&ctx, &closed.id).await,
        Err(DomainError::RegistrationClosed)
    );
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
}
