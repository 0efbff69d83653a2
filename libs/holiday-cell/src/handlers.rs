use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{HolidayError, HolidayRangeQuery};
use crate::services::HolidayCalculator;

impl From<HolidayError> for AppError {
    fn from(err: HolidayError) -> Self {
        match err {
            HolidayError::UnknownProfile(_) | HolidayError::InvalidFixedDate { .. } => {
                AppError::Internal(err.to_string())
            }
            HolidayError::YearOutOfRange(_) | HolidayError::InvalidRange { .. } => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

#[axum::debug_handler]
pub async fn get_holidays_for_year(
    State(config): State<Arc<AppConfig>>,
    Path(year): Path<i32>,
) -> Result<Json<Value>, AppError> {
    let calculator = HolidayCalculator::from_profile_name(&config.holiday_profile)?;
    let holidays = calculator.compute_holidays(year)?;

    debug!("Computed {} holidays for {}", holidays.len(), year);

    Ok(Json(json!({
        "year": year,
        "profile": calculator.profile().name,
        "holidays": holidays,
    })))
}

#[axum::debug_handler]
pub async fn get_holiday_background_events(
    State(config): State<Arc<AppConfig>>,
    Query(range): Query<HolidayRangeQuery>,
) -> Result<Json<Value>, AppError> {
    let calculator = HolidayCalculator::from_profile_name(&config.holiday_profile)?;
    let events = calculator.background_events(range.start, range.end)?;

    Ok(Json(json!({ "events": events })))
}
