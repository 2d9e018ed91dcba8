use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;
use crate::models::AppState;

pub mod admin_routes;
pub mod appointment_routes;
pub mod auth_routes;
pub mod clinical_entry_routes;
pub mod clinical_record_routes;
pub mod dictionary_routes;
pub mod doctor_routes;
pub mod document_routes;
pub mod document_type_routes;
pub mod notification_routes;
pub mod patient_routes;
pub mod schedule_routes;
pub mod specialty_routes;
pub mod user_routes;
pub mod video_call_routes;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1/auth", auth_routes::router())
        .nest("/api/v1/users", user_routes::router())
        .nest("/api/v1/patients", patient_routes::router())
        .nest("/api/v1/doctors", doctor_routes::router())
        .nest("/api/v1/administrators", admin_routes::router())
        .nest("/api/v1/document-types", document_type_routes::router())
        .nest("/api/v1/documents", document_routes::router())
        .nest("/api/v1/schedules", schedule_routes::router())
        .nest("/api/v1/appointments", appointment_routes::router())
        .nest("/api/v1/clinical-records", clinical_record_routes::router())
        .nest("/api/v1/clinical-entries", clinical_entry_routes::router())
        .nest("/api/v1/dictionary", dictionary_routes::router())
        .nest("/api/v1/specialties", specialty_routes::router())
        .nest("/api/v1/notifications", notification_routes::router())
        .nest("/api/v1/video-calls", video_call_routes::router())
        .with_state(state)
}

/* ============================================================
   Shared request helpers
   ============================================================ */

pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let v = value.trim();
    if v.is_empty() {
        return Err(ApiError::validation(format!("{field} is required")));
    }
    Ok(v.to_string())
}

pub(crate) fn max_len(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    if value.chars().count() > max {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Blank optional text is stored as NULL.
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("{field} must be YYYY-MM-DD")))
}

pub(crate) fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ApiError> {
    let v = value.trim();
    NaiveTime::parse_from_str(v, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(v, "%H:%M"))
        .map_err(|_| ApiError::validation(format!("{field} must be HH:MM or HH:MM:SS")))
}

/// Validation status shared by documents and doctors.
pub(crate) const REVIEW_STATUSES: &[&str] = &["Pendiente", "Aprobado", "Rechazado"];

pub(crate) fn review_status(field: &str, value: &str) -> Result<&'static str, ApiError> {
    REVIEW_STATUSES
        .iter()
        .find(|s| s.eq_ignore_ascii_case(value.trim()))
        .copied()
        .ok_or_else(|| {
            ApiError::validation(format!("{field} must be one of {}", REVIEW_STATUSES.join(", ")))
        })
}

/// Procedures return flags as BOOLEAN, TINYINT or text depending on the column.
pub(crate) fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        B(bool),
        N(i64),
        S(String),
    }
    Ok(match Raw::deserialize(d)? {
        Raw::B(b) => b,
        Raw::N(n) => n != 0,
        Raw::S(s) => matches!(s.trim(), "1" | "true" | "TRUE" | "True"),
    })
}
