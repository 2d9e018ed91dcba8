// src/routes/clinical_record_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patient/{patient_user_id}", get(get_for_patient))
        .route(
            "/{doctor_user_id}/{patient_user_id}/history",
            put(update_history),
        )
        .route("/{doctor_user_id}/{patient_user_id}/full", get(get_full))
}

#[derive(Debug, Deserialize)]
pub struct UpdateHistoryRequest {
    /// Free-text background (allergies, chronic conditions, surgeries).
    pub history: String,
}

#[derive(Debug, Serialize)]
pub struct FullRecord {
    pub record: Value,
    pub entries: Vec<Value>,
}

fn record_not_found() -> ApiError {
    ApiError::NotFound("CLINICAL_RECORD_NOT_FOUND", "clinical record does not exist".into())
}

/// GET /clinical-records/patient/{patient_user_id}
pub async fn get_for_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(patient_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    authorize(&state, Operation::ClinicalRecordGet, &principal, Some(patient_user_id)).await?;

    let record = state
        .procedures
        .row(ProcedureCall::new(Procedure::ClinicalRecordGetByPatient).arg(patient_user_id))
        .await?
        .ok_or_else(record_not_found)?;
    Ok(Json(ApiOk::new(record)))
}

/// PUT /clinical-records/{doctor_user_id}/{patient_user_id}/history
pub async fn update_history(
    State(state): State<AppState>,
    principal: Principal,
    PathParam((doctor_user_id, patient_user_id)): PathParam<(i64, i64)>,
    JsonBody(req): JsonBody<UpdateHistoryRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::ClinicalRecordUpdateHistory, &principal, Some(doctor_user_id)).await?;

    let updated = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::ClinicalRecordUpdateHistory)
                .arg(doctor_user_id)
                .arg(patient_user_id)
                .arg(req.history.trim()),
        )
        .await?;

    if updated == 0 {
        return Err(record_not_found());
    }
    Ok(Json(ApiOk::new(OkData::with_message("medical history updated"))))
}

/// GET /clinical-records/{doctor_user_id}/{patient_user_id}/full
/// Record and its entries in one call (two result sets).
pub async fn get_full(
    State(state): State<AppState>,
    principal: Principal,
    PathParam((doctor_user_id, patient_user_id)): PathParam<(i64, i64)>,
) -> Result<Json<ApiOk<FullRecord>>, ApiError> {
    authorize(&state, Operation::ClinicalRecordFull, &principal, Some(doctor_user_id)).await?;

    let (record, entries) = state
        .procedures
        .primary_with_dependent::<Value, Value>(
            ProcedureCall::new(Procedure::ClinicalRecordFullByPatient)
                .arg(doctor_user_id)
                .arg(patient_user_id),
        )
        .await?
        .ok_or_else(record_not_found)?;

    Ok(Json(ApiOk::new(FullRecord { record, entries })))
}
