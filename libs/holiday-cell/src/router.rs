use std::sync::Arc;
use axum::{middleware, routing::get, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn holiday_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(get_holiday_background_events))
        .route("/{year}", get(get_holidays_for_year))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
