// src/routes/schedule_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, admit, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
    routes::{flag, parse_date, parse_time},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_range))
        .route("/{doctor_user_id}", get(list_slots))
        .route("/{doctor_user_id}/available", get(list_available_slots))
        .route("/slots/{slot_id}/toggle", put(toggle_slot))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateRangeRequest {
    pub doctor_user_id: i64,
    /// YYYY-MM-DD
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Serialize)]
pub struct RangeCreated {
    pub slots_created: i64,
}

#[derive(Debug, Deserialize)]
pub struct ToggleSlotRequest {
    pub doctor_user_id: i64,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct SlotToggled {
    pub slot_id: i64,
    pub available: bool,
    pub updated: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotDto {
    #[serde(rename(deserialize = "id_agenda"))]
    pub slot_id: i64,
    #[serde(rename(deserialize = "fecha"))]
    pub date: String,
    #[serde(rename(deserialize = "hora"))]
    pub time: String,
    #[serde(rename(deserialize = "disponible"), deserialize_with = "flag")]
    pub available: bool,
}

/* ============================================================
   Handlers
   ============================================================ */

/// POST /schedules
/// Splits [start, end) on the doctor's date into slots; the procedure decides
/// slot length and rejects past dates or inverted ranges.
pub async fn create_range(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<CreateRangeRequest>,
) -> Result<(StatusCode, Json<ApiOk<RangeCreated>>), ApiError> {
    authorize(&state, Operation::ScheduleCreateRange, &principal, Some(req.doctor_user_id)).await?;

    let date = parse_date("date", &req.date)?;
    let start = parse_time("start_time", &req.start_time)?;
    let end = parse_time("end_time", &req.end_time)?;
    if end <= start {
        return Err(ApiError::validation("end_time must be after start_time"));
    }

    let slots_created = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::AgendaCreateRange)
                .arg(req.doctor_user_id)
                .arg(date)
                .arg(start)
                .arg(end),
        )
        .await?;

    tracing::info!(doctor_user_id = req.doctor_user_id, %date, slots_created, "schedule range created");
    Ok((StatusCode::CREATED, Json(ApiOk::new(RangeCreated { slots_created }))))
}

/// GET /schedules/{doctor_user_id}
pub async fn list_slots(
    State(state): State<AppState>,
    PathParam(doctor_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<SlotDto>>>, ApiError> {
    admit(Operation::ScheduleList, None)?;
    let slots = state
        .procedures
        .rows(ProcedureCall::new(Procedure::AgendaListByUser).arg(doctor_user_id))
        .await?;
    Ok(Json(ApiOk::new(slots)))
}

/// GET /schedules/{doctor_user_id}/available
pub async fn list_available_slots(
    State(state): State<AppState>,
    PathParam(doctor_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<SlotDto>>>, ApiError> {
    admit(Operation::ScheduleListAvailable, None)?;
    let slots = state
        .procedures
        .rows(ProcedureCall::new(Procedure::AgendaListAvailableByUser).arg(doctor_user_id))
        .await?;
    Ok(Json(ApiOk::new(slots)))
}

/// PUT /schedules/slots/{slot_id}/toggle
/// Sets availability to the value sent, so repeating the request is harmless.
pub async fn toggle_slot(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(slot_id): PathParam<i64>,
    JsonBody(req): JsonBody<ToggleSlotRequest>,
) -> Result<Json<ApiOk<SlotToggled>>, ApiError> {
    authorize(&state, Operation::ScheduleToggleSlot, &principal, Some(req.doctor_user_id)).await?;

    let updated = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::AgendaToggleSlot)
                .arg(req.doctor_user_id)
                .arg(slot_id)
                .arg(req.available),
        )
        .await?;

    Ok(Json(ApiOk::new(SlotToggled {
        slot_id,
        available: req.available,
        updated,
    })))
}
