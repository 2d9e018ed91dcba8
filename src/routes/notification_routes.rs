// src/routes/notification_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::params::PathParam,
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
    routes::flag,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/patient/{patient_user_id}", get(list_for_patient))
        .route("/doctor/{doctor_user_id}", get(list_for_doctor))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationDto {
    #[serde(rename(deserialize = "id_notificacion"))]
    pub notification_id: i64,
    #[serde(rename(deserialize = "mensaje"))]
    pub message: String,
    #[serde(rename(deserialize = "fecha_envio"), default)]
    pub sent_at: Option<String>,
    #[serde(rename(deserialize = "leida"), deserialize_with = "flag", default)]
    pub read: bool,
    #[serde(rename(deserialize = "id_cita"), default)]
    pub appointment_id: Option<i64>,
}

async fn list(
    state: &AppState,
    principal: &Principal,
    op: Operation,
    procedure: Procedure,
    user_id: i64,
) -> Result<Json<ApiOk<Vec<NotificationDto>>>, ApiError> {
    authorize(state, op, principal, Some(user_id)).await?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(procedure).arg(user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

/// GET /notifications/patient/{patient_user_id}
pub async fn list_for_patient(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(patient_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<NotificationDto>>>, ApiError> {
    list(
        &state,
        &principal,
        Operation::NotificationListPatient,
        Procedure::NotificationListPatient,
        patient_user_id,
    )
    .await
}

/// GET /notifications/doctor/{doctor_user_id}
pub async fn list_for_doctor(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(doctor_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<NotificationDto>>>, ApiError> {
    list(
        &state,
        &principal,
        Operation::NotificationListDoctor,
        Procedure::NotificationListDoctor,
        doctor_user_id,
    )
    .await
}
