// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use holiday_cell::HolidayError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// VALIDATION
// ==============================================================================

/// A time range the user is trying to book or move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposedAppointment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub professional_id: Option<Uuid>,
    /// Appointment being edited, ignored by the overlap check.
    #[serde(default)]
    pub exclude_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InvalidRange,
    HolidayBlocked,
    ProfessionalOverlap,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidRange => "invalid_range",
            RejectionReason::HolidayBlocked => "holiday_blocked",
            RejectionReason::ProfessionalOverlap => "professional_overlap",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::InvalidRange => "O horário de fim deve ser maior que o início.",
            RejectionReason::HolidayBlocked => "Data bloqueada: feriado nacional.",
            RejectionReason::ProfessionalOverlap => "O profissional já possui atendimento neste horário.",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
    /// Holiday name or conflicting appointment id, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ValidationResult {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
            detail: None,
        }
    }

    pub fn rejected(reason: RejectionReason, detail: Option<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            detail,
        }
    }
}

/// Whether two appointments of the same professional may overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    #[default]
    Disabled,
    SameProfessional,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "disabled" | "off" => Ok(OverlapPolicy::Disabled),
            "same_professional" => Ok(OverlapPolicy::SameProfessional),
            other => Err(format!("Unknown overlap policy: {}", other)),
        }
    }
}

// ==============================================================================
// BOOKING REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentRequest {
    pub patient_id: Option<Uuid>,
    pub professional_id: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub room: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpcomingQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionQuery {
    pub start: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectionAllowed {
    pub start: DateTime<Utc>,
    pub local_date: NaiveDate,
    pub allowed: bool,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("{0}")]
    MissingField(&'static str),

    #[error("Appointment rejected: {reason}")]
    Rejected {
        reason: RejectionReason,
        detail: Option<String>,
    },

    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("Holiday lookup failed: {0}")]
    Holidays(#[from] HolidayError),

    #[error("Backing store error: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::MissingField(message) => AppError::ValidationError(message.to_string()),
            AppointmentError::Rejected { reason: RejectionReason::InvalidRange, .. } => {
                AppError::ValidationError(RejectionReason::InvalidRange.message().to_string())
            }
            AppointmentError::Rejected { reason, detail } => AppError::BlockedByPolicy {
                reason: reason.code().to_string(),
                message: match detail {
                    Some(detail) => format!("{} ({})", reason.message(), detail),
                    None => reason.message().to_string(),
                },
            },
            AppointmentError::NotFound(id) => AppError::NotFound(format!("Appointment {} not found", id)),
            AppointmentError::Holidays(e) => e.into(),
            AppointmentError::Database(e) => e.into(),
            AppointmentError::Store(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_policy_parses_config_values() {
        assert_eq!("disabled".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Disabled));
        assert_eq!("".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Disabled));
        assert_eq!("same_professional".parse::<OverlapPolicy>(), Ok(OverlapPolicy::SameProfessional));
        assert!("strict".parse::<OverlapPolicy>().is_err());
    }

    #[test]
    fn rejections_map_to_error_taxonomy() {
        let range: AppError = AppointmentError::Rejected {
            reason: RejectionReason::InvalidRange,
            detail: None,
        }
        .into();
        assert!(matches!(range, AppError::ValidationError(_)));

        let holiday: AppError = AppointmentError::Rejected {
            reason: RejectionReason::HolidayBlocked,
            detail: Some("Confraternização Universal".into()),
        }
        .into();
        assert_eq!(
            holiday,
            AppError::BlockedByPolicy {
                reason: "holiday_blocked".into(),
                message: "Data bloqueada: feriado nacional. (Confraternização Universal)".into(),
            }
        );

        let missing: AppError = AppointmentError::MissingField("Selecione um paciente.").into();
        assert_eq!(missing, AppError::ValidationError("Selecione um paciente.".into()));
    }

    #[test]
    fn result_serializes_reason_in_snake_case() {
        let result = ValidationResult::rejected(RejectionReason::HolidayBlocked, None);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["accepted"], false);
        assert_eq!(json["reason"], "holiday_blocked");
        assert!(json.get("detail").is_none());
    }
}
