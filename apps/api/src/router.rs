use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use appointment_cell::router::appointment_routes;
use holiday_cell::router::holiday_routes;
use patient_cell::router::{create_patient_router, create_professional_router};
use scheduling_cell::router::calendar_routes;

use crate::context::AppContext;
use crate::session::session_routes;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(ctx: Arc<AppContext>) -> Router {
    let config = ctx.config.clone();

    Router::new()
        .route("/", get(|| async { "Clinic agenda API is running!" }))
        .route("/health", get(health))
        .nest("/holidays", holiday_routes(config.clone()))
        .nest("/appointments", appointment_routes(ctx.clone()))
        .nest("/calendar", calendar_routes(ctx.clone()))
        .nest("/patients", create_patient_router(config.clone()))
        .nest("/professionals", create_professional_router(config))
        .nest("/session", session_routes(ctx))
}
