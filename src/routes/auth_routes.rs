use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    auth::{
        generate_access_token, hash_access_token, hash_password, password_policy_violation,
        verify_password,
    },
    authz::{Operation, Principal, Role, admit, authorize},
    error::ApiError,
    middleware::json_body::JsonBody,
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        // Rotate access token for the current session (old token stops working immediately)
        .route("/refresh", post(refresh))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub remember_me: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginData {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshData {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// POST /api/v1/auth/login
/// Unknown email and wrong password give the same 401.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<ApiOk<LoginData>>, ApiError> {
    admit(Operation::AuthLogin, None)?;
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let user = state
        .accounts
        .find_credentials(&email)
        .await?
        .ok_or_else(ApiError::invalid_credentials)?;

    let stored = user.contrasena.as_deref().unwrap_or_default();
    if !verify_password(&req.password, stored) {
        tracing::info!(user_id = user.id_usuario, "login rejected");
        return Err(ApiError::invalid_credentials());
    }

    if !user.activo {
        let reason = user
            .motivo_inactivacion
            .unwrap_or_else(|| "no reason recorded".to_string());
        return Err(ApiError::Forbidden(
            "ACCOUNT_DEACTIVATED",
            format!("account is deactivated: {reason}"),
        ));
    }

    let role = Role::from_db(&user.rol)
        .ok_or_else(|| ApiError::Internal(format!("unknown role {:?} for user {}", user.rol, user.id_usuario)))?;

    let ttl_hours = if req.remember_me.unwrap_or(false) {
        state.remember_me_ttl_hours
    } else {
        state.session_ttl_hours
    };
    let expires_at = Utc::now() + Duration::hours(ttl_hours);

    let access_token = generate_access_token();
    let session_id = state
        .accounts
        .create_session(user.id_usuario, &hash_access_token(&access_token), expires_at)
        .await?;

    tracing::info!(user_id = user.id_usuario, session_id, role = role.label(), "login");

    let name = [user.nombre.as_deref(), user.apellidos.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Json(ApiOk::new(LoginData {
        access_token,
        token_type: "Bearer",
        expires_at,
        user: UserProfile {
            user_id: user.id_usuario,
            name,
            email: user.correo.unwrap_or(email),
            role,
        },
    })))
}

pub async fn logout(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::AuthLogout, &principal, None).await?;
    let revoked = state
        .accounts
        .revoke_session(principal.session_id, principal.user_id)
        .await?;
    if !revoked {
        return Err(ApiError::session_expired());
    }
    Ok(Json(ApiOk::new(OkData::done())))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiOk<Value>>, ApiError> {
    authorize(&state, Operation::AuthMe, &principal, None).await?;
    let user = state
        .procedures
        .row(ProcedureCall::new(Procedure::UserGet).arg(principal.user_id))
        .await?
        .ok_or_else(ApiError::session_expired)?;
    Ok(Json(ApiOk::new(user)))
}

/// POST /api/v1/auth/change-password
/// Other sessions of the user are revoked; the current one stays.
pub async fn change_password(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::AuthChangePassword, &principal, None).await?;
    if req.current_password.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::validation(
            "current_password and new_password are required",
        ));
    }
    if req.new_password != req.confirm_password {
        return Err(ApiError::validation("new_password and confirm_password do not match"));
    }
    if let Some(msg) = password_policy_violation(&req.new_password) {
        return Err(ApiError::validation(msg));
    }

    let stored = state
        .accounts
        .password_hash(principal.user_id)
        .await?
        .ok_or_else(ApiError::session_expired)?;

    if !verify_password(&req.current_password, &stored) {
        return Err(ApiError::BadRequest(
            "WRONG_PASSWORD",
            "current password is incorrect".into(),
        ));
    }

    let new_hash = hash_password(&req.new_password).map_err(ApiError::Internal)?;
    state
        .accounts
        .update_password(principal.user_id, &new_hash, principal.session_id)
        .await?;

    tracing::info!(user_id = principal.user_id, "password changed");
    Ok(Json(ApiOk::new(OkData::with_message("password updated"))))
}

/// POST /api/v1/auth/refresh
/// Keeps the session and its expiry, swaps the token.
pub async fn refresh(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<ApiOk<RefreshData>>, ApiError> {
    authorize(&state, Operation::AuthRefresh, &principal, None).await?;
    let access_token = generate_access_token();
    let expires_at = state
        .accounts
        .rotate_session(
            principal.session_id,
            principal.user_id,
            &hash_access_token(&access_token),
        )
        .await?
        .ok_or_else(ApiError::session_expired)?;

    Ok(Json(ApiOk::new(RefreshData {
        access_token,
        expires_at,
    })))
}
