// src/routes/document_type_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
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
        .route("/", get(list_types).post(create_type))
        .route("/{type_id}", get(get_type).put(update_type).delete(delete_type))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentTypeDto {
    #[serde(rename(deserialize = "id_tipo_documento"))]
    pub type_id: i64,
    #[serde(rename(deserialize = "nombre"))]
    pub name: String,
    #[serde(rename(deserialize = "descripcion"), default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentTypeRequest {
    pub name: String,
    pub description: Option<String>,
}

fn type_not_found() -> ApiError {
    ApiError::NotFound("DOCUMENT_TYPE_NOT_FOUND", "document type does not exist".into())
}

fn clean_name(raw: &str) -> Result<String, ApiError> {
    let name = required_text("name", raw)?;
    max_len("name", &name, 100)?;
    Ok(name)
}

pub async fn list_types(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<DocumentTypeDto>>>, ApiError> {
    admit(Operation::DocumentTypeList, None)?;
    let types = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DocumentTypeList))
        .await?;
    Ok(Json(ApiOk::new(types)))
}

pub async fn get_type(
    State(state): State<AppState>,
    PathParam(type_id): PathParam<i64>,
) -> Result<Json<ApiOk<DocumentTypeDto>>, ApiError> {
    admit(Operation::DocumentTypeGet, None)?;
    let ty = state
        .procedures
        .row(ProcedureCall::new(Procedure::DocumentTypeGet).arg(type_id))
        .await?
        .ok_or_else(type_not_found)?;
    Ok(Json(ApiOk::new(ty)))
}

pub async fn create_type(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<DocumentTypeRequest>,
) -> Result<(StatusCode, Json<ApiOk<CreatedId>>), ApiError> {
    authorize(&state, Operation::DocumentTypeCreate, &principal, None).await?;
    let name = clean_name(&req.name)?;

    let id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DocumentTypeCreate)
                .arg(name)
                .arg(optional_text(req.description)),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(ApiOk::new(CreatedId { id }))))
}

pub async fn update_type(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(type_id): PathParam<i64>,
    JsonBody(req): JsonBody<DocumentTypeRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::DocumentTypeUpdate, &principal, None).await?;
    let name = clean_name(&req.name)?;

    let updated = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DocumentTypeUpdate)
                .arg(type_id)
                .arg(name)
                .arg(optional_text(req.description)),
        )
        .await?;

    if updated == 0 {
        return Err(type_not_found());
    }
    Ok(Json(ApiOk::new(OkData::with_message("document type updated"))))
}

/// Types referenced by uploaded documents cannot be removed.
pub async fn delete_type(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(type_id): PathParam<i64>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::DocumentTypeDelete, &principal, None).await?;

    let deleted = state
        .procedures
        .scalar_i64(ProcedureCall::new(Procedure::DocumentTypeDelete).arg(type_id))
        .await?;

    if deleted == 0 {
        return Err(type_not_found());
    }
    Ok(Json(ApiOk::new(OkData::with_message("document type deleted"))))
}
