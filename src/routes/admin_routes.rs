// src/routes/admin_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use serde::Serialize;

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::params::PathParam,
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{user_id}", get(get_admin_id))
}

#[derive(Debug, Serialize)]
pub struct AdminId {
    pub user_id: i64,
    pub admin_id: i64,
}

/// GET /administrators/{user_id}
pub async fn get_admin_id(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<AdminId>>, ApiError> {
    authorize(&state, Operation::AdminLookup, &principal, None).await?;

    let admin_id = state
        .procedures
        .scalar_i64(ProcedureCall::new(Procedure::AdminGetIdByUser).arg(user_id))
        .await?;
    if admin_id == 0 {
        return Err(ApiError::NotFound(
            "ADMIN_NOT_FOUND",
            "user is not an administrator".into(),
        ));
    }

    Ok(Json(ApiOk::new(AdminId { user_id, admin_id })))
}
