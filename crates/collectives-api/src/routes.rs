// ============================================================================
// Collectives API - Router
// File: crates/collectives-api/src/routes.rs
// ============================================================================

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::{events, health, listings, registrations};
use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        // Events
        .route("/events", get(listings::events).post(events::create))
        .route("/events/{id}", put(events::update))
        .route("/events/{id}/visible", get(events::visible))
        .route(
            "/events/{id}/register",
            post(registrations::register).get(registrations::check_register),
        )
        .route("/events/{id}/admit", post(registrations::admit))
        .route("/events/{id}/close", post(registrations::close_event))
        // Registrations
        .route("/registrations/{id}", delete(registrations::delete))
        .route("/registrations/{id}/cancel", post(registrations::cancel))
        .route("/registrations/{id}/reject", post(registrations::reject))
        .route("/registrations/{id}/level", post(registrations::change_level))
        .route(
            "/registrations/{id}/payment/confirmed",
            post(registrations::payment_confirmed),
        )
        .route(
            "/registrations/{id}/payment/expired",
            post(registrations::payment_expired),
        )
        // Listings
        .route("/users/{id}/events", get(listings::user_events))
        .route("/leaders/{id}/events", get(listings::leader_events))
        .route("/badges", get(listings::badges))
}

/// Full router: `/health` plus the JSON API under `/api/v1`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
}
