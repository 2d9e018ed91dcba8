// src/routes/specialty_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, admit, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, CreatedId, OkData},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, optional_text, required_text},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_specialties).post(create_specialty))
        .route("/assign", post(assign_specialty))
        .route("/doctor/{doctor_user_id}", get(list_for_doctor))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SpecialtyDto {
    #[serde(rename(deserialize = "id_especialidad"))]
    pub specialty_id: i64,
    #[serde(rename(deserialize = "nombre"))]
    pub name: String,
    #[serde(rename(deserialize = "descripcion"), default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSpecialtyRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub doctor_user_id: i64,
    pub specialty_id: i64,
}

pub async fn list_specialties(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<SpecialtyDto>>>, ApiError> {
    admit(Operation::SpecialtyList, None)?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::SpecialtyList))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

pub async fn create_specialty(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<CreateSpecialtyRequest>,
) -> Result<(StatusCode, Json<ApiOk<CreatedId>>), ApiError> {
    authorize(&state, Operation::SpecialtyCreate, &principal, None).await?;
    let name = required_text("name", &req.name)?;
    max_len("name", &name, 100)?;

    let id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::SpecialtyCreate)
                .arg(name)
                .arg(optional_text(req.description)),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(CreatedId { id }))))
}

/// POST /specialties/assign
pub async fn assign_specialty(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<AssignRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::SpecialtyAssign, &principal, None).await?;

    state
        .procedures
        .scalar(
            ProcedureCall::new(Procedure::DoctorSpecialtyAssign)
                .arg(req.doctor_user_id)
                .arg(req.specialty_id),
        )
        .await?;

    tracing::info!(
        doctor_user_id = req.doctor_user_id,
        specialty_id = req.specialty_id,
        "specialty assigned"
    );
    Ok(Json(ApiOk::new(OkData::with_message("specialty assigned"))))
}

pub async fn list_for_doctor(
    State(state): State<AppState>,
    PathParam(doctor_user_id): PathParam<i64>,
) -> Result<Json<ApiOk<Vec<SpecialtyDto>>>, ApiError> {
    admit(Operation::SpecialtyListDoctor, None)?;
    let rows = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DoctorSpecialtyList).arg(doctor_user_id))
        .await?;
    Ok(Json(ApiOk::new(rows)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::test_support::{FakeProcedures, clinic_accounts, principal, state_with};
    use serde_json::json;

    #[tokio::test]
    async fn doctors_cannot_assign_themselves_specialties() {
        let procs = FakeProcedures::default();
        let state = state_with(procs.clone(), clinic_accounts());

        let err = assign_specialty(
            State(state),
            principal(2, Role::Doctor),
            JsonBody(AssignRequest {
                doctor_user_id: 2,
                specialty_id: 1,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(procs.call_count(), 0);
    }

    #[tokio::test]
    async fn assigning_to_unknown_specialty_is_not_found() {
        let procs = FakeProcedures::default()
            .raise(Procedure::DoctorSpecialtyAssign, "La especialidad no existe");
        let state = state_with(procs, clinic_accounts());

        let err = assign_specialty(
            State(state),
            principal(1, Role::Administrator),
            JsonBody(AssignRequest {
                doctor_user_id: 2,
                specialty_id: 99,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "SPECIALTY_NOT_FOUND");
    }

    #[tokio::test]
    async fn duplicate_name_is_rejected() {
        let procs = FakeProcedures::default()
            .raise(Procedure::SpecialtyCreate, "La especialidad ya existe");
        let state = state_with(procs, clinic_accounts());

        let err = create_specialty(
            State(state),
            principal(1, Role::Administrator),
            JsonBody(CreateSpecialtyRequest {
                name: "Pediatría".into(),
                description: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn doctor_specialties_are_public() {
        let procs = FakeProcedures::default().rows(
            Procedure::DoctorSpecialtyList,
            vec![json!({"id_especialidad": 1, "nombre": "Medicina general", "descripcion": null})],
        );
        let state = state_with(procs, clinic_accounts());

        let Json(body) = list_for_doctor(State(state), PathParam(2)).await.unwrap();
        assert_eq!(body.data[0].name, "Medicina general");
    }
}
