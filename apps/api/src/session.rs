use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use realtime_cell::{BusDebugState, LifecycleEvent};
use scheduling_cell::{build_calendar_events, resolve_professional_filter};
use shared_models::error::AppError;
use shared_utils::extractor::{auth_middleware, AccessToken};

use crate::context::AppContext;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub event: LifecycleEvent,
}

#[derive(Debug, Deserialize)]
pub struct AgendaQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub professional_id: Option<String>,
}

#[axum::debug_handler]
pub async fn sign_in(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Value>, AppError> {
    let session = ctx
        .supabase
        .sign_in_with_password(&request.email, &request.password)
        .await?;
    let role = ctx.sign_in(session.clone()).await?;

    Ok(Json(json!({ "role": role, "session": session })))
}

#[axum::debug_handler]
pub async fn refresh_session(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let session = ctx.supabase.refresh_session(&request.refresh_token).await?;
    ctx.token_refreshed(session.clone()).await?;

    Ok(Json(json!({ "session": session })))
}

#[axum::debug_handler]
pub async fn sign_out(
    State(ctx): State<Arc<AppContext>>,
    Extension(AccessToken(token)): Extension<AccessToken>,
) -> StatusCode {
    if let Err(e) = ctx.supabase.sign_out(&token).await {
        warn!("Remote sign-out failed, ending local session anyway: {}", e);
    }
    ctx.sign_out().await;

    StatusCode::NO_CONTENT
}

#[axum::debug_handler]
pub async fn report_lifecycle(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<LifecycleRequest>,
) -> Result<StatusCode, AppError> {
    ctx.lifecycle(request.event).await?;
    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
pub async fn realtime_state(State(ctx): State<Arc<AppContext>>) -> Json<BusDebugState> {
    let state = ctx.realtime_state().await.unwrap_or(BusDebugState {
        running: false,
        role: None,
        topics: BTreeMap::new(),
    });

    Json(state)
}

/// Accepts a hosted-Postgres change message and republishes it on the bus.
#[axum::debug_handler]
pub async fn receive_change(
    State(ctx): State<Arc<AppContext>>,
    Json(message): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let event = ctx.publish_change(&message).await?;
    debug!("Queued {:?} on {}", event.kind, event.entity);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "entity": event.entity, "kind": event.kind })),
    ))
}

/// Calendar view kept fresh by the change bus: appointments from the live
/// snapshot plus holiday background events for the visible range.
#[axum::debug_handler]
pub async fn get_agenda(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<AgendaQuery>,
) -> Result<Json<Value>, AppError> {
    let store = ctx
        .current_store()
        .await
        .ok_or_else(|| AppError::Auth("No active session".to_string()))?;
    let snapshot = store.snapshot().await;

    let filter = resolve_professional_filter(&ctx.preferences, query.professional_id.as_deref(), &snapshot);
    let events: Vec<_> = build_calendar_events(&snapshot, filter)
        .into_iter()
        .filter(|event| {
            let day = ctx.validator.local_date(event.start);
            day >= query.start && day <= query.end
        })
        .collect();
    let holidays = ctx.holidays.background_events(query.start, query.end)?;

    Ok(Json(json!({
        "today": ctx.validator.local_date(Utc::now()),
        "role": ctx.session_role().await,
        "professional_id": filter,
        "refreshed_at": snapshot.refreshed_at(),
        "events": events,
        "holidays": holidays,
    })))
}

pub fn session_routes(ctx: Arc<AppContext>) -> Router {
    let protected = Router::new()
        .route("/", get(realtime_state).delete(sign_out))
        .route("/agenda", get(get_agenda))
        .route("/lifecycle", post(report_lifecycle))
        .route("/changes", post(receive_change))
        .layer(middleware::from_fn_with_state(ctx.config.clone(), auth_middleware));

    Router::new()
        .route("/sign-in", post(sign_in))
        .route("/refresh", post(refresh_session))
        .merge(protected)
        .with_state(ctx)
}
