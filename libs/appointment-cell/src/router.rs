// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::context::BookingContext;
use crate::handlers;

pub fn appointment_routes(ctx: Arc<dyn BookingContext>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_appointment))
        .route("/validate", post(handlers::validate_appointment))
        .route("/selection", get(handlers::check_selection))
        .route("/upcoming", get(handlers::get_upcoming_appointments))
        .route("/patients/{patient_id}", get(handlers::get_patient_appointments))
        .route(
            "/{appointment_id}",
            put(handlers::update_appointment).delete(handlers::delete_appointment),
        )
        .layer(middleware::from_fn_with_state(ctx.config(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(ctx)
}
