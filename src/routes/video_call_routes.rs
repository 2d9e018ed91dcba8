// src/routes/video_call_routes.rs

use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::{
    accounts::AppointmentParticipants,
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::PathParam},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, required_text},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{appointment_id}", post(create_video_call).get(get_video_call))
}

#[derive(Debug, Deserialize)]
pub struct CreateVideoCallRequest {
    pub link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoCallDto {
    #[serde(rename(deserialize = "id_cita"))]
    pub appointment_id: i64,
    #[serde(rename(deserialize = "enlace_videollamada"))]
    pub link: String,
    #[serde(rename(deserialize = "fecha"), default)]
    pub date: Option<String>,
    #[serde(rename(deserialize = "hora"), default)]
    pub time: Option<String>,
}

async fn participants(state: &AppState, appointment_id: i64) -> Result<AppointmentParticipants, ApiError> {
    state
        .accounts
        .appointment_participants(appointment_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("APPOINTMENT_NOT_FOUND", "appointment does not exist".into()))
}

/// POST /video-calls/{appointment_id}
pub async fn create_video_call(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(appointment_id): PathParam<i64>,
    JsonBody(req): JsonBody<CreateVideoCallRequest>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    authorize(&state, Operation::VideoCallCreate, &principal, None).await?;
    let link = required_text("link", &req.link)?;
    max_len("link", &link, 255)?;

    let who = participants(&state, appointment_id).await?;
    if who.doctor_user_id != principal.user_id {
        tracing::warn!(appointment_id, user_id = principal.user_id, "video call set by non-assigned doctor");
        return Err(ApiError::Forbidden(
            "NOT_ASSIGNED_DOCTOR",
            "only the assigned doctor can set the video call".into(),
        ));
    }

    let message = state
        .procedures
        .scalar_text(
            ProcedureCall::new(Procedure::VideoCallCreate)
                .arg(appointment_id)
                .arg(link),
        )
        .await?
        .unwrap_or_else(|| "video call link saved".to_string());

    Ok(Json(ApiOk::new(OkData::with_message(message))))
}

/// GET /video-calls/{appointment_id}
pub async fn get_video_call(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(appointment_id): PathParam<i64>,
) -> Result<Json<ApiOk<VideoCallDto>>, ApiError> {
    authorize(&state, Operation::VideoCallGet, &principal, None).await?;

    if !principal.is_admin() {
        let who = participants(&state, appointment_id).await?;
        if principal.user_id != who.patient_user_id && principal.user_id != who.doctor_user_id {
            return Err(ApiError::Forbidden(
                "NOT_PARTICIPANT",
                "you do not have permission for this appointment".into(),
            ));
        }
    }

    let call = state
        .procedures
        .row(ProcedureCall::new(Procedure::VideoCallGet).arg(appointment_id))
        .await?
        .ok_or_else(|| {
            ApiError::NotFound("VIDEO_CALL_NOT_FOUND", "no video call configured for this appointment".into())
        })?;
    Ok(Json(ApiOk::new(call)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use crate::authz::Role;
    use crate::procedures::Param;
    use crate::test_support::{FakeProcedures, clinic_accounts, principal, state_with};
    use serde_json::json;

    fn link() -> JsonBody<CreateVideoCallRequest> {
        JsonBody(CreateVideoCallRequest {
            link: "https://meet.example.org/abc".into(),
        })
    }

    #[tokio::test]
    async fn assigned_doctor_sets_the_link() {
        let procs = FakeProcedures::default()
            .scalar(Procedure::VideoCallCreate, json!("Enlace registrado"));
        let accounts = clinic_accounts().with_participants(9, 3, 2);
        let state = state_with(procs.clone(), accounts);

        let Json(body) = create_video_call(State(state), principal(2, Role::Doctor), PathParam(9), link())
            .await
            .unwrap();

        assert_eq!(body.data.message.as_deref(), Some("Enlace registrado"));
        assert_eq!(
            procs.calls()[0].params,
            vec![Param::Int(9), Param::Text("https://meet.example.org/abc".into())]
        );
    }

    #[tokio::test]
    async fn another_doctor_is_forbidden() {
        let procs = FakeProcedures::default();
        let accounts = clinic_accounts().with_participants(9, 3, 5);
        let state = state_with(procs.clone(), accounts);

        let err = create_video_call(State(state), principal(2, Role::Doctor), PathParam(9), link())
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(procs.call_count(), 0);
    }

    #[tokio::test]
    async fn blank_link_is_rejected_before_lookup() {
        let accounts = clinic_accounts();
        let state = state_with(FakeProcedures::default(), accounts.clone());

        let err = create_video_call(
            State(state),
            principal(2, Role::Doctor),
            PathParam(9),
            JsonBody(CreateVideoCallRequest { link: "  ".into() }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(accounts.lookups(), 0);
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let state = state_with(FakeProcedures::default(), clinic_accounts());
        let err = create_video_call(State(state), principal(2, Role::Doctor), PathParam(9), link())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patients_cannot_set_links() {
        let state = state_with(FakeProcedures::default(), clinic_accounts().with_participants(9, 3, 2));
        let err = create_video_call(State(state), principal(3, Role::Patient), PathParam(9), link())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[rstest::rstest]
    #[case(3, Role::Patient, StatusCode::OK)]
    #[case(2, Role::Doctor, StatusCode::OK)]
    #[case(1, Role::Administrator, StatusCode::OK)]
    #[case(4, Role::Patient, StatusCode::FORBIDDEN)]
    #[tokio::test]
    async fn only_participants_read_the_link(
        #[case] user_id: i64,
        #[case] role: Role,
        #[case] expected: StatusCode,
    ) {
        let procs = FakeProcedures::default().row(
            Procedure::VideoCallGet,
            json!({"id_cita": 9, "enlace_videollamada": "https://meet.example.org/abc", "fecha": null, "hora": null}),
        );
        let state = state_with(procs, clinic_accounts().with_participants(9, 3, 2));

        let status = match get_video_call(State(state), principal(user_id, role), PathParam(9)).await {
            Ok(_) => StatusCode::OK,
            Err(e) => e.status(),
        };
        assert_eq!(status, expected);
    }

    #[tokio::test]
    async fn unconfigured_call_is_not_found() {
        let state = state_with(FakeProcedures::default(), clinic_accounts().with_participants(9, 3, 2));
        let err = get_video_call(State(state), principal(3, Role::Patient), PathParam(9))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VIDEO_CALL_NOT_FOUND");
    }
}
