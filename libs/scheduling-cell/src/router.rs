use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_utils::extractor::auth_middleware;

use crate::context::SchedulingContext;
use crate::handlers::*;

pub fn calendar_routes(ctx: Arc<dyn SchedulingContext>) -> Router {
    Router::new()
        .route("/events", get(get_calendar_events))
        .route("/{entity}/{id}", get(get_snapshot_entity))
        .layer(middleware::from_fn_with_state(ctx.config(), auth_middleware))
        .with_state(ctx)
}
