// src/routes/user_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{hash_password, password_policy_violation},
    authz::{Operation, Principal, Role, admit, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
    routes::{flag, max_len, optional_text, parse_date, required_text},
};

const DEFAULT_DEACTIVATION_REASON: &str = "Desactivado por el administrador";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(register_user))
        .route(
            "/{user_id}",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .route("/{user_id}/activate", post(activate_user))
}

/* ============================================================
   DTOs
   ============================================================ */

/// Public view of a `usuario` row. Never carries the password hash.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserPublic {
    #[serde(rename(deserialize = "id_usuario"))]
    pub user_id: i64,
    #[serde(rename(deserialize = "nombre"))]
    pub first_name: String,
    #[serde(rename(deserialize = "apellidos"))]
    pub last_name: String,
    #[serde(rename(deserialize = "documento"), default)]
    pub document: Option<String>,
    #[serde(rename(deserialize = "correo"))]
    pub email: String,
    #[serde(rename(deserialize = "telefono"), default)]
    pub phone: Option<String>,
    #[serde(rename(deserialize = "rol"))]
    pub role: String,
    #[serde(rename(deserialize = "activo"), deserialize_with = "flag")]
    pub active: bool,
    #[serde(rename(deserialize = "motivo_inactivacion"), default)]
    pub inactive_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    /// YYYY-MM-DD
    pub birth_date: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DeactivateRequest {
    pub reason: Option<String>,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("USER_NOT_FOUND", "user does not exist".into())
}

fn clean_email(raw: &str) -> Result<String, ApiError> {
    let email = required_text("email", raw)?.to_lowercase();
    max_len("email", &email, 120)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::BadRequest("INVALID_EMAIL", "invalid email format".into())),
    }
}

async fn read_user(state: &AppState, user_id: i64) -> Result<UserPublic, ApiError> {
    state
        .procedures
        .row(ProcedureCall::new(Procedure::UserGet).arg(user_id))
        .await?
        .ok_or_else(user_not_found)
}

/* ============================================================
   POST /users  (public registration)
   ============================================================ */

pub async fn register_user(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiOk<UserPublic>>), ApiError> {
    admit(Operation::UserRegister, None)?;
    let first_name = required_text("first_name", &req.first_name)?;
    let last_name = required_text("last_name", &req.last_name)?;
    let document = required_text("document", &req.document)?;
    let birth_date = parse_date("birth_date", &req.birth_date)?;
    let email = clean_email(&req.email)?;
    if let Some(msg) = password_policy_violation(&req.password) {
        return Err(ApiError::validation(msg));
    }

    let password_hash = hash_password(&req.password).map_err(ApiError::Internal)?;

    let user_id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::UserCreate)
                .arg(first_name)
                .arg(last_name)
                .arg(document)
                .arg(birth_date)
                .arg(email)
                .arg(optional_text(req.phone))
                .arg(password_hash)
                .arg(req.role.as_db_str()),
        )
        .await?;

    tracing::info!(user_id, role = req.role.label(), "user registered");
    Ok((StatusCode::CREATED, Json(ApiOk::new(read_user(&state, user_id).await?))))
}

/* ============================================================
   Reads
   ============================================================ */

pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiOk<Vec<UserPublic>>>, ApiError> {
    authorize(&state, Operation::UserList, &principal, None).await?;
    let users = state
        .procedures
        .rows(ProcedureCall::new(Procedure::UserList))
        .await?;
    Ok(Json(ApiOk::new(users)))
}

pub async fn get_user(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    authorize(&state, Operation::UserGet, &principal, Some(user_id)).await?;
    Ok(Json(ApiOk::new(read_user(&state, user_id).await?)))
}

/* ============================================================
   Writes
   ============================================================ */

pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<Json<ApiOk<UserPublic>>, ApiError> {
    authorize(&state, Operation::UserUpdate, &principal, Some(user_id)).await?;
    let first_name = required_text("first_name", &req.first_name)?;
    let last_name = required_text("last_name", &req.last_name)?;
    let email = clean_email(&req.email)?;

    state
        .procedures
        .scalar(
            ProcedureCall::new(Procedure::UserUpdate)
                .arg(user_id)
                .arg(first_name)
                .arg(last_name)
                .arg(email)
                .arg(optional_text(req.phone)),
        )
        .await?;

    Ok(Json(ApiOk::new(read_user(&state, user_id).await?)))
}

/// DELETE /users/{user_id}
/// Soft delete: the account is marked inactive with a reason.
pub async fn deactivate_user(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
    body: Option<Json<DeactivateRequest>>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::UserDeactivate, &principal, None).await?;
    if user_id == principal.user_id {
        return Err(ApiError::validation("administrators cannot deactivate themselves"));
    }

    let req = body.map(|Json(r)| r).unwrap_or_default();
    let reason = optional_text(req.reason).unwrap_or_else(|| DEFAULT_DEACTIVATION_REASON.to_string());

    state
        .procedures
        .scalar(
            ProcedureCall::new(Procedure::UserDeactivate)
                .arg(user_id)
                .arg(reason),
        )
        .await?;

    tracing::info!(user_id, by = principal.user_id, "user deactivated");
    Ok(Json(ApiOk::new(OkData::with_message("user deactivated"))))
}

pub async fn activate_user(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::UserActivate, &principal, None).await?;

    state
        .procedures
        .scalar(ProcedureCall::new(Procedure::UserActivate).arg(user_id))
        .await?;

    tracing::info!(user_id, by = principal.user_id, "user activated");
    Ok(Json(ApiOk::new(OkData::with_message("user activated"))))
}
