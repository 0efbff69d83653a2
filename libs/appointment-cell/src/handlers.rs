// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::context::BookingContext;
use crate::models::{
    AppointmentRequest, ProposedAppointment, SelectionAllowed, SelectionQuery, UpcomingQuery, ValidationResult,
};
use crate::services::booking::{BookingService, DEFAULT_UPCOMING_LIMIT};

/// Booking service over the live store of the caller's session.
async fn booking_service<'a>(ctx: &'a dyn BookingContext, token: &str) -> Result<BookingService<'a>, AppError> {
    let store = ctx.scheduling_store(token).await?;
    Ok(BookingService::new(ctx.holidays(), ctx.validator(), store))
}

// ==============================================================================
// VALIDATION
// ==============================================================================

#[axum::debug_handler]
pub async fn validate_appointment(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(proposed): Json<ProposedAppointment>,
) -> Result<Json<ValidationResult>, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let result = service.validate(&proposed).await?;

    debug!("Validation for {} - {}: {:?}", proposed.start, proposed.end, result.reason);
    Ok(Json(result))
}

#[axum::debug_handler]
pub async fn check_selection(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<SelectionQuery>,
) -> Result<Json<SelectionAllowed>, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let allowed = service.selection_allowed(query.start).await?;

    Ok(Json(SelectionAllowed {
        start: query.start,
        local_date: service.validator().local_date(query.start),
        allowed,
    }))
}

// ==============================================================================
// WRITES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<AppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("User {} creating appointment", user.id);

    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let appointment = service.create_appointment(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Agendamento criado!"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<AppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let appointment = service.update_appointment(appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Agendamento atualizado!"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    service.delete_appointment(appointment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_upcoming_appointments(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<UpcomingQuery>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let appointments = service
        .upcoming_appointments(query.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT))
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(ctx): State<Arc<dyn BookingContext>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = booking_service(ctx.as_ref(), auth.token()).await?;
    let appointments = service.appointments_for_patient(patient_id).await?;

    Ok(Json(json!({
        "patient_id": patient_id,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
