// src/routes/doctor_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    authz::{Operation, Principal, admit, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, optional_text, review_status},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_doctors))
        .route("/by-status/{status}", get(list_by_status))
        .route("/{user_id}", get(get_doctor).put(update_doctor))
        .route("/{user_id}/status", get(get_status))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDoctorRequest {
    pub license: Option<String>,
    pub years_experience: Option<i64>,
    pub bio: Option<String>,
    pub photo: Option<String>,
    pub professional_email: Option<String>,
    pub village: Option<String>,
}

fn doctor_not_found() -> ApiError {
    ApiError::NotFound("DOCTOR_NOT_FOUND", "doctor does not exist".into())
}

async fn read_doctor(state: &AppState, user_id: i64) -> Result<Value, ApiError> {
    state
        .procedures
        .row(ProcedureCall::new(Procedure::DoctorGetByUser).arg(user_id))
        .await?
        .ok_or_else(doctor_not_found)
}

pub async fn list_doctors(State(state): State<AppState>) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    admit(Operation::DoctorList, None)?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DoctorList))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

/// GET /doctors/by-status/{status}
pub async fn list_by_status(
    State(state): State<AppState>,
    PathParam(status): PathParam<String>,
) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    admit(Operation::DoctorListByStatus, None)?;
    let status = review_status("status", &status)?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DoctorListByStatus).arg(status))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

pub async fn get_doctor(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    admit(Operation::DoctorGet, None)?;
    Ok(Json(ApiOk::new(read_doctor(&state, user_id).await?)))
}

/// GET /doctors/{user_id}/status
/// Approval state plus how many required document types are approved.
pub async fn get_status(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    admit(Operation::DoctorStatus, None)?;
    let status = state
        .procedures
        .row(ProcedureCall::new(Procedure::DoctorStatus).arg(user_id))
        .await?
        .ok_or_else(doctor_not_found)?;
    Ok(Json(ApiOk::new(status)))
}

/// PUT /doctors/{user_id}
/// Absent fields are sent as NULL and left untouched by the procedure.
pub async fn update_doctor(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateDoctorRequest>,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    authorize(&state, Operation::DoctorUpdate, &principal, Some(user_id)).await?;

    let license = optional_text(req.license);
    if let Some(l) = &license {
        max_len("license", l, 50)?;
    }
    if req.years_experience.is_some_and(|y| !(0..=70).contains(&y)) {
        return Err(ApiError::validation("years_experience must be between 0 and 70"));
    }

    state
        .procedures
        .scalar(
            ProcedureCall::new(Procedure::DoctorUpdate)
                .arg(user_id)
                .arg(license)
                .arg(req.years_experience)
                .arg(optional_text(req.bio))
                .arg(optional_text(req.photo))
                .arg(optional_text(req.professional_email))
                .arg(optional_text(req.village)),
        )
        .await?;

    Ok(Json(ApiOk::new(read_doctor(&state, user_id).await?)))
}
