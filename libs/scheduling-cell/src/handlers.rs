use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::entities::EntityType;
use shared_models::error::AppError;
use shared_utils::extractor::AccessToken;

use crate::context::SchedulingContext;
use crate::models::{CalendarQuery, SnapshotEntity};
use crate::services::{build_calendar_events, resolve_professional_filter};

#[axum::debug_handler]
pub async fn get_calendar_events(
    State(ctx): State<Arc<dyn SchedulingContext>>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Value>, AppError> {
    let store = ctx.scheduling_store(&token).await?;
    let snapshot = store.refresh().await?;

    let filter = resolve_professional_filter(ctx.preferences(), query.professional_id.as_deref(), &snapshot);
    let events = build_calendar_events(&snapshot, filter);

    debug!("Built {} calendar events (filter: {:?})", events.len(), filter);

    Ok(Json(json!({
        "professional_id": filter,
        "refreshed_at": snapshot.refreshed_at(),
        "events": events,
    })))
}

#[axum::debug_handler]
pub async fn get_snapshot_entity(
    State(ctx): State<Arc<dyn SchedulingContext>>,
    Extension(AccessToken(token)): Extension<AccessToken>,
    Path((entity, id)): Path<(String, Uuid)>,
) -> Result<Json<SnapshotEntity>, AppError> {
    let entity: EntityType = entity.parse().map_err(AppError::BadRequest)?;

    let store = ctx.scheduling_store(&token).await?;
    Ok(Json(store.get_by_id(entity, id).await?))
}
