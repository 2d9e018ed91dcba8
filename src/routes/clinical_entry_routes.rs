// src/routes/clinical_entry_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    authz::{Operation, Principal, Role, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall, value_as_i64},
    routes::{optional_text, required_text},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_entry))
        .route("/{entry_id}", get(get_entry).put(update_entry))
        .route("/patient/{patient_user_id}", get(list_for_patient))
        .route("/doctor/{doctor_user_id}", get(list_for_doctor))
}

#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    pub doctor_user_id: i64,
    pub appointment_id: i64,
    pub diagnosis: String,
    pub treatment: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEntryRequest {
    pub doctor_user_id: i64,
    pub diagnosis: String,
    pub treatment: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntryCreated {
    pub entry_id: i64,
}

fn entry_not_found() -> ApiError {
    ApiError::NotFound("CLINICAL_ENTRY_NOT_FOUND", "clinical entry does not exist".into())
}

/// POST /clinical-entries
/// Only for completed appointments, one entry per appointment.
pub async fn create_entry(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<CreateEntryRequest>,
) -> Result<(StatusCode, Json<ApiOk<EntryCreated>>), ApiError> {
    authorize(&state, Operation::ClinicalEntryCreate, &principal, Some(req.doctor_user_id)).await?;
    let diagnosis = required_text("diagnosis", &req.diagnosis)?;
    let treatment = required_text("treatment", &req.treatment)?;

    let entry_id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::ClinicalEntryCreate)
                .arg(req.doctor_user_id)
                .arg(req.appointment_id)
                .arg(diagnosis)
                .arg(treatment)
                .arg(optional_text(req.notes)),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(EntryCreated { entry_id }))))
}

/// PUT /clinical-entries/{entry_id}
pub async fn update_entry(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(entry_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateEntryRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::ClinicalEntryUpdate, &principal, Some(req.doctor_user_id)).await?;
    let diagnosis = required_text("diagnosis", &req.diagnosis)?;
    let treatment = required_text("treatment", &req.treatment)?;

    let updated = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::ClinicalEntryUpdate)
                .arg(req.doctor_user_id)
                .arg(entry_id)
                .arg(diagnosis)
                .arg(treatment)
                .arg(optional_text(req.notes)),
        )
        .await?;

    if updated == 0 {
        return Err(entry_not_found());
    }
    Ok(Json(ApiOk::new(OkData::with_message("clinical entry updated"))))
}

/// GET /clinical-entries/{entry_id}
/// The entry names its patient and doctor by profile id, so the caller's own
/// profile id is looked up first and compared after the read.
pub async fn get_entry(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(entry_id): PathParam<i64>,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    authorize(&state, Operation::ClinicalEntryGet, &principal, None).await?;

    let mine = if principal.is_admin() {
        None
    } else {
        let profile = state.accounts.profile_id(principal.role, principal.user_id).await?;
        Some(profile.ok_or_else(|| {
            ApiError::NotFound(
                "NOT_REGISTERED",
                format!("user not registered as {}", principal.role.label()),
            )
        })?)
    };

    let entry: Value = state
        .procedures
        .row(ProcedureCall::new(Procedure::ClinicalEntryGet).arg(entry_id))
        .await?
        .ok_or_else(entry_not_found)?;

    if let Some(mine) = mine {
        let owner_column = match principal.role {
            Role::Doctor => "id_medico",
            _ => "id_paciente",
        };
        if entry.get(owner_column).and_then(value_as_i64) != Some(mine) {
            tracing::warn!(entry_id, user_id = principal.user_id, "clinical entry read by non-participant");
            return Err(ApiError::Forbidden(
                "FORBIDDEN",
                "you can only read entries of your own appointments".into(),
            ));
        }
    }

    Ok(Json(ApiOk::new(entry)))
}

/// GET /clinical-entries/patient/{patient_user_id}
pub async fn list_for_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(patient_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    authorize(&state, Operation::ClinicalEntryListPatient, &principal, Some(patient_user_id)).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::ClinicalEntryListByPatient).arg(patient_user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

/// GET /clinical-entries/doctor/{doctor_user_id}
pub async fn list_for_doctor(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(doctor_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    authorize(&state, Operation::ClinicalEntryListDoctor, &principal, Some(doctor_user_id)).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::ClinicalEntryListByDoctor).arg(doctor_user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}
