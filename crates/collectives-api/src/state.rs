use std::sync::Arc;

use collectives_core::oracle::MembershipOracle;
use collectives_core::repositories::{CatalogRepository, EventRepository, UnitOfWork, UserRepository};
use collectives_core::services::{CallerService, EventService, ListingService, RegistrationService};
use collectives_core::Clock;
use collectives_security::JwtService;
use collectives_shared::ClubSettings;

use crate::rate_limit::RegistrationLimiter;

/// Storage handles the services run against.
#[derive(Clone)]
pub struct Backend {
    pub uow: Arc<dyn UnitOfWork>,
    pub events: Arc<dyn EventRepository>,
    pub users: Arc<dyn UserRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub oracle: Arc<dyn MembershipOracle>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registrations: Arc<RegistrationService<dyn UnitOfWork, dyn MembershipOracle>>,
    pub events: Arc<EventService<dyn UnitOfWork, dyn CatalogRepository>>,
    pub listings: Arc<ListingService<dyn EventRepository, dyn UserRepository>>,
    pub callers: Arc<CallerService<dyn UserRepository>>,
    pub jwt: Arc<JwtService>,
    pub clock: Arc<dyn Clock>,
    pub settings: Arc<ClubSettings>,
    pub limiter: Arc<RegistrationLimiter>,
}

impl AppState {
    pub fn new(
        backend: Backend,
        jwt: JwtService,
        clock: Arc<dyn Clock>,
        settings: ClubSettings,
        limiter: RegistrationLimiter,
    ) -> Self {
        Self {
            registrations: Arc::new(RegistrationService::new(backend.uow.clone(), backend.oracle)),
            events: Arc::new(EventService::new(backend.uow, backend.catalog)),
            listings: Arc::new(ListingService::new(backend.events, backend.users.clone())),
            callers: Arc::new(CallerService::new(backend.users)),
            jwt: Arc::new(jwt),
            clock,
            settings: Arc::new(settings),
            limiter: Arc::new(limiter),
        }
    }
}
