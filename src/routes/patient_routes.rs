// src/routes/patient_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, optional_text},
};

const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_patients))
        .route("/{user_id}", get(get_patient).put(update_patient))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Serialize, Deserialize)]
pub struct PatientDto {
    #[serde(rename(deserialize = "id_paciente"))]
    pub patient_id: i64,
    #[serde(rename(deserialize = "id_usuario"))]
    pub user_id: i64,
    #[serde(rename(deserialize = "nombre"), default)]
    pub first_name: Option<String>,
    #[serde(rename(deserialize = "apellidos"), default)]
    pub last_name: Option<String>,
    #[serde(rename(deserialize = "correo"), default)]
    pub email: Option<String>,
    #[serde(rename(deserialize = "tipo_sangre"), default)]
    pub blood_type: Option<String>,
    #[serde(rename(deserialize = "eps"), default)]
    pub insurance: Option<String>,
    #[serde(rename(deserialize = "contacto_emergencia"), default)]
    pub emergency_contact: Option<String>,
    #[serde(rename(deserialize = "telefono_emergencia"), default)]
    pub emergency_phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePatientRequest {
    pub blood_type: Option<String>,
    pub insurance: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
}

fn patient_not_found() -> ApiError {
    ApiError::NotFound("PATIENT_NOT_FOUND", "patient does not exist".into())
}

async fn read_patient(state: &AppState, user_id: i64) -> Result<PatientDto, ApiError> {
    state
        .procedures
        .row(ProcedureCall::new(Procedure::PatientGetByUser).arg(user_id))
        .await?
        .ok_or_else(patient_not_found)
}

/* ============================================================
   Handlers
   ============================================================ */

pub async fn list_patients(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiOk<Vec<PatientDto>>>, ApiError> {
    authorize(&state, Operation::PatientList, &principal, None).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::PatientList))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

pub async fn get_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<PatientDto>>, ApiError> {
    authorize(&state, Operation::PatientGet, &principal, Some(user_id)).await?;
    Ok(Json(ApiOk::new(read_patient(&state, user_id).await?)))
}

/// PUT /patients/{user_id}
pub async fn update_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdatePatientRequest>,
) -> Result<Json<ApiOk<PatientDto>>, ApiError> {
    authorize(&state, Operation::PatientUpdate, &principal, Some(user_id)).await?;

    let blood_type = optional_text(req.blood_type).map(|b| b.to_uppercase());
    if let Some(b) = &blood_type {
        if !BLOOD_TYPES.contains(&b.as_str()) {
            return Err(ApiError::validation(format!(
                "blood_type must be one of {}",
                BLOOD_TYPES.join(", ")
            )));
        }
    }
    let emergency_phone = optional_text(req.emergency_phone);
    if let Some(p) = &emergency_phone {
        max_len("emergency_phone", p, 20)?;
    }

    state
        .procedures
        .scalar(
            ProcedureCall::new(Procedure::PatientUpdate)
                .arg(user_id)
                .arg(blood_type)
                .arg(optional_text(req.insurance))
                .arg(optional_text(req.emergency_contact))
                .arg(emergency_phone),
        )
        .await?;

    tracing::info!(user_id, updated_by = principal.user_id, "patient profile updated");
    Ok(Json(ApiOk::new(read_patient(&state, user_id).await?)))
}
