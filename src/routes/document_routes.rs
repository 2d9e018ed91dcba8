// src/routes/document_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::{PathParam, QueryParam}},
    models::{ApiOk, AppState},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, optional_text, required_text, review_status},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents).post(upload_document))
        .route("/{document_id}/validate", post(validate_document))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub doctor_user_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub doctor_user_id: i64,
    pub document_type_id: i64,
    /// Stored file reference (path or URL), max 200 chars.
    pub file: String,
}

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub document_id: i64,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub admin_user_id: i64,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentDto {
    #[serde(rename(deserialize = "id_documento"))]
    pub document_id: i64,
    #[serde(rename(deserialize = "archivo"))]
    pub file: String,
    #[serde(rename(deserialize = "fecha_subida"))]
    pub uploaded_at: Option<String>,
    #[serde(rename(deserialize = "estado"))]
    pub status: String,
    #[serde(rename(deserialize = "id_tipo_documento"))]
    pub document_type_id: i64,
    #[serde(rename(deserialize = "tipo_documento"))]
    pub document_type: String,
    #[serde(rename(deserialize = "descripcion"), default)]
    pub description: Option<String>,
}

/// Doctor approval state after a document review.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationSummary {
    #[serde(rename(deserialize = "estado_medico"))]
    pub doctor_status: Option<String>,
    #[serde(rename(deserialize = "tipos_aprobados"), default)]
    pub approved_types: i64,
    #[serde(rename(deserialize = "tipos_requeridos"), default)]
    pub required_types: i64,
    #[serde(rename(deserialize = "mensaje"), default)]
    pub message: Option<String>,
}

/// GET /documents?doctor_user_id=
pub async fn list_documents(
    State(state): State<AppState>,
    principal: Principal,
    QueryParam(q): QueryParam<ListQuery>,
) -> Result<Json<ApiOk<Vec<DocumentDto>>>, ApiError> {
    let doctor_user_id = q
        .doctor_user_id
        .ok_or_else(|| ApiError::validation("doctor_user_id is required"))?;
    authorize(&state, Operation::DocumentList, &principal, Some(doctor_user_id)).await?;

    let docs = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DocumentListByUser).arg(doctor_user_id))
        .await?;
    Ok(Json(ApiOk::new(docs)))
}

/// POST /documents
pub async fn upload_document(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<UploadRequest>,
) -> Result<(StatusCode, Json<ApiOk<Uploaded>>), ApiError> {
    authorize(&state, Operation::DocumentUpload, &principal, Some(req.doctor_user_id)).await?;
    let file = required_text("file", &req.file)?;
    max_len("file", &file, 200)?;

    let document_id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DocumentUpload)
                .arg(req.doctor_user_id)
                .arg(req.document_type_id)
                .arg(file),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new(Uploaded {
            document_id,
            status: "Pendiente",
        })),
    ))
}

/// POST /documents/{document_id}/validate
/// The procedure recomputes the doctor's approval state from all document
/// reviews and reports it back.
pub async fn validate_document(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(document_id): PathParam<i64>,
    JsonBody(req): JsonBody<ValidateRequest>,
) -> Result<Json<ApiOk<ValidationSummary>>, ApiError> {
    authorize(&state, Operation::DocumentValidate, &principal, Some(req.admin_user_id)).await?;
    let status = review_status("status", &req.status)?;

    let summary = state
        .procedures
        .row::<ValidationSummary>(
            ProcedureCall::new(Procedure::DocumentValidate)
                .arg(document_id)
                .arg(status)
                .arg(optional_text(req.notes))
                .arg(req.admin_user_id),
        )
        .await?
        .unwrap_or(ValidationSummary {
            doctor_status: None,
            approved_types: 0,
            required_types: 0,
            message: None,
        });

    tracing::info!(document_id, status, admin_user_id = req.admin_user_id, "document reviewed");
    Ok(Json(ApiOk::new(ValidationSummary {
        message: summary
            .message
            .or_else(|| Some(format!("document marked {}", status.to_lowercase()))),
        ..summary
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::Role;
    use crate::test_support::{FakeAccounts, FakeProcedures, clinic_accounts, principal, state_with};
    use serde_json::json;

    #[tokio::test]
    async fn listing_requires_doctor_param() {
        let state = state_with(FakeProcedures::default(), clinic_accounts());
        let err = list_documents(
            State(state),
            principal(2, Role::Doctor),
            QueryParam(ListQuery { doctor_user_id: None }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn documents_decode_from_procedure_columns() {
        let procs = FakeProcedures::default().rows(
            Procedure::DocumentListByUser,
            vec![json!({
                "id_documento": 5, "archivo": "licencia.pdf", "fecha_subida": "2026-01-10",
                "estado": "Pendiente", "id_tipo_documento": 1, "tipo_documento": "Licencia",
                "descripcion": null
            })],
        );
        let state = state_with(procs, clinic_accounts());

        let Json(body) = list_documents(
            State(state),
            principal(2, Role::Doctor),
            QueryParam(ListQuery { doctor_user_id: Some(2) }),
        )
        .await
        .unwrap();

        assert_eq!(body.data[0].document_type, "Licencia");
        assert_eq!(body.data[0].status, "Pendiente");
    }

    #[tokio::test]
    async fn validation_must_be_recorded_under_the_callers_own_id() {
        let procs = FakeProcedures::default();
        let state = state_with(procs.clone(), clinic_accounts());

        let err = validate_document(
            State(state),
            principal(1, Role::Administrator),
            PathParam(5),
            JsonBody(ValidateRequest {
                admin_user_id: 6,
                status: "Aprobado".into(),
                notes: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(procs.call_count(), 0);
    }

    #[tokio::test]
    async fn administrator_without_profile_cannot_review() {
        let procs = FakeProcedures::default()
            .raise(Procedure::DocumentValidate, "El usuario no está registrado como administrador");
        let state = state_with(procs.clone(), FakeAccounts::default());

        let err = validate_document(
            State(state),
            principal(1, Role::Administrator),
            PathParam(5),
            JsonBody(ValidateRequest {
                admin_user_id: 1,
                status: "Aprobado".into(),
                notes: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_REGISTERED");
        assert_eq!(procs.call_count(), 0);
    }

    #[tokio::test]
    async fn unknown_review_status_is_rejected() {
        let procs = FakeProcedures::default();
        let state = state_with(procs.clone(), clinic_accounts());

        let err = validate_document(
            State(state),
            principal(1, Role::Administrator),
            PathParam(5),
            JsonBody(ValidateRequest {
                admin_user_id: 1,
                status: "Archivado".into(),
                notes: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(procs.call_count(), 0);
    }

    #[tokio::test]
    async fn approval_returns_doctor_summary() {
        let procs = FakeProcedures::default().row(
            Procedure::DocumentValidate,
            json!({"estado_medico": "Aprobado", "tipos_aprobados": 3, "tipos_requeridos": 3, "mensaje": null}),
        );
        let state = state_with(procs, clinic_accounts());

        let Json(body) = validate_document(
            State(state),
            principal(1, Role::Administrator),
            PathParam(5),
            JsonBody(ValidateRequest {
                admin_user_id: 1,
                status: "aprobado".into(),
                notes: Some("ok".into()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(body.data.doctor_status.as_deref(), Some("Aprobado"));
        assert_eq!(body.data.message.as_deref(), Some("document marked aprobado"));
    }

    #[tokio::test]
    async fn unapproved_doctor_upload_surfaces_procedure_error() {
        let procs = FakeProcedures::default()
            .raise(Procedure::DocumentUpload, "Documento duplicado para este tipo");
        let state = state_with(procs, clinic_accounts());

        let err = upload_document(
            State(state),
            principal(2, Role::Doctor),
            JsonBody(UploadRequest {
                doctor_user_id: 2,
                document_type_id: 1,
                file: "licencia.pdf".into(),
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.code(), "DUPLICATE_DOCUMENT");
    }
}
