use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, error, info, warn};

use collectives_api::rate_limit::RegistrationLimiter;
use collectives_api::state::Backend;
use collectives_api::{router, AppState};
use collectives_core::memory::InMemoryStore;
use collectives_core::oracle::{DisabledOracle, MembershipOracle};
use collectives_core::{Clock, RequestContext, SystemClock};
use collectives_infrastructure::{
    create_pool, run_migrations, HttpMembershipOracle, PgCatalogRepository, PgEventRepository,
    PgUnitOfWork, PgUserRepository,
};
use collectives_security::JwtService;
use collectives_shared::config::AppConfig;

const MEMORY_URL_SCHEME: &str = "memory://";
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

fn uses_memory_store(url: &str) -> bool {
    url.starts_with(MEMORY_URL_SCHEME)
}

fn membership_oracle(config: &AppConfig) -> Arc<dyn MembershipOracle> {
    match &config.oracle.base_url {
        Some(base_url) => {
            info!(base_url = %base_url, "membership registry configured");
            Arc::new(HttpMembershipOracle::new(base_url.clone(), config.oracle.api_key.clone()))
        }
        None => {
            warn!("no membership registry configured, license refresh disabled");
            Arc::new(DisabledOracle)
        }
    }
}

async fn backend(config: &AppConfig) -> anyhow::Result<Backend> {
    let oracle = membership_oracle(config);
    if uses_memory_store(&config.database.url) {
        warn!("running on the in-memory store, nothing is persisted");
        let store = Arc::new(InMemoryStore::new());
        return Ok(Backend {
            uow: store.clone(),
            events: store.clone(),
            users: store.clone(),
            catalog: store,
            oracle,
        });
    }

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    info!("Database connection established.");
    Ok(Backend {
        uow: Arc::new(PgUnitOfWork::new(pool.clone())),
        events: Arc::new(PgEventRepository::new(pool.clone())),
        users: Arc::new(PgUserRepository::new(pool.clone())),
        catalog: Arc::new(PgCatalogRepository::new(pool)),
        oracle,
    })
}

/// Expires unpaid registrations and hands their slots to the waiting lists,
/// then prunes idle members from the registration throttle.
fn spawn_housekeeping(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(HOUSEKEEPING_INTERVAL);
        loop {
            ticker.tick().await;
            let ctx = RequestContext::anonymous(state.clock.now(), state.settings.clone());
            match state.registrations.purge_expired_payments(&ctx).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "expired payment registrations purged"),
                Err(e) => error!(error = %e, "payment purge failed"),
            }
            let tracked = state.limiter.retain_recent();
            debug!(tracked, "registration throttle pruned");
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Initialize telemetry
    collectives_shared::telemetry::init_telemetry();

    info!("Collectives Server starting...");

    // Load configuration
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let backend = backend(&config).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.club.utc_offset_hours));
    let state = AppState::new(
        backend,
        JwtService::new(config.jwt.secret.clone(), config.jwt.access_token_expiry),
        clock,
        config.club.clone(),
        RegistrationLimiter::per_minute(config.rate_limit.registrations_per_minute),
    );
    spawn_housekeeping(state.clone());

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        );

    // Bind address
    let host: std::net::IpAddr = config.app.host.parse()?;
    let addr = SocketAddr::from((host, config.app.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
