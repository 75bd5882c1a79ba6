use std::sync::Arc;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;

use crate::handlers;

/// Reads are public. Mutations extract a bearer token and forward it to the
/// store, which checks ownership.
pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/{provider_id}/available-slots", get(handlers::get_available_slots))
        .route("/{provider_id}/schedule", get(handlers::get_weekly_schedule))
        .route(
            "/{provider_id}/schedule/{day_of_week}",
            put(handlers::upsert_weekly_schedule).delete(handlers::delete_weekly_schedule),
        )
        .route(
            "/{provider_id}/overrides",
            get(handlers::get_overrides).post(handlers::create_override),
        )
        .route("/{provider_id}/overrides/{override_id}", delete(handlers::delete_override))
        .route("/{provider_id}/bookings/attempt", post(handlers::attempt_booking))
        .with_state(state)
}
