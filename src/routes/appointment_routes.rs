// src/routes/appointment_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
    routes::{optional_text, required_text},
};

const DEFAULT_CANCEL_REASON: &str = "Sin motivo especificado";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_appointment))
        .route("/{appointment_id}/cancel", put(cancel_appointment))
        .route("/{appointment_id}/accept", put(accept_appointment))
        .route("/{appointment_id}/complete", put(complete_appointment))
        .route("/patient/{user_id}", get(list_for_patient))
        .route("/doctor/{user_id}", get(list_for_doctor))
}

#[derive(Debug, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_user_id: i64,
    pub doctor_user_id: i64,
    pub slot_id: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AppointmentCreated {
    pub appointment_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Patient or doctor of the appointment.
    pub user_id: i64,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DoctorActionRequest {
    pub doctor_user_id: i64,
}

/* ============================================================
   POST /appointments
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<ApiOk<AppointmentCreated>>), ApiError> {
    authorize(&state, Operation::AppointmentCreate, &principal, Some(req.patient_user_id)).await?;
    let reason = required_text("reason", &req.reason)?;

    let appointment_id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::AppointmentCreate)
                .arg(req.patient_user_id)
                .arg(req.doctor_user_id)
                .arg(req.slot_id)
                .arg(reason),
        )
        .await?;

    tracing::info!(appointment_id, patient_user_id = req.patient_user_id, "appointment booked");
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new(AppointmentCreated { appointment_id })),
    ))
}

/* ============================================================
   State transitions
   ============================================================ */

/// PUT /appointments/{id}/cancel
/// Not idempotent: cancelling twice is reported by the procedure and becomes 400.
pub async fn cancel_appointment(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(appointment_id): PathParam<i64>,
    JsonBody(req): JsonBody<CancelRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::AppointmentCancel, &principal, Some(req.user_id)).await?;
    let reason = optional_text(req.reason).unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::AppointmentCancel)
                .arg(appointment_id)
                .arg(req.user_id)
                .arg(reason),
        )
        .await?;

    Ok(Json(ApiOk::new(OkData::with_message("appointment cancelled"))))
}

async fn doctor_transition(
    state: &AppState,
    principal: &Principal,
    op: Operation,
    procedure: Procedure,
    appointment_id: i64,
    doctor_user_id: i64,
    fallback: &str,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(state, op, principal, Some(doctor_user_id)).await?;

    let message = state
        .procedures
        .scalar_text(
            ProcedureCall::new(procedure)
                .arg(doctor_user_id)
                .arg(appointment_id),
        )
        .await?
        .unwrap_or_else(|| fallback.to_string());

    Ok(Json(ApiOk::new(OkData::with_message(message))))
}

/// PUT /appointments/{id}/accept
pub async fn accept_appointment(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(appointment_id): PathParam<i64>,
    JsonBody(req): JsonBody<DoctorActionRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    doctor_transition(
        &state,
        &principal,
        Operation::AppointmentAccept,
        Procedure::AppointmentAccept,
        appointment_id,
        req.doctor_user_id,
        "appointment accepted",
    )
    .await
}

/// PUT /appointments/{id}/complete
pub async fn complete_appointment(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(appointment_id): PathParam<i64>,
    JsonBody(req): JsonBody<DoctorActionRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    doctor_transition(
        &state,
        &principal,
        Operation::AppointmentComplete,
        Procedure::AppointmentComplete,
        appointment_id,
        req.doctor_user_id,
        "appointment completed",
    )
    .await
}

/* ============================================================
   Listings
   ============================================================ */

pub async fn list_for_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    authorize(&state, Operation::AppointmentListPatient, &principal, Some(user_id)).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::AppointmentListPatient).arg(user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

pub async fn list_for_doctor(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<Value>>>, ApiError> {
    authorize(&state, Operation::AppointmentListDoctor, &principal, Some(user_id)).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::AppointmentListDoctor).arg(user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}
