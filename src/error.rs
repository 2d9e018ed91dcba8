use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::procedures::{DomainError, DomainErrorKind, ErrorClass, ProcedureError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Internal(String),
    Hinted(Box<ApiError>, String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Email or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", message.into())
    }

    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        match self {
            ApiError::Hinted(inner, _) => ApiError::Hinted(inner, hint.into()),
            other => ApiError::Hinted(Box::new(other), hint.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(..) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(..) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(..) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Hinted(inner, _) => inner.status(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(code, _)
            | ApiError::Forbidden(code, _)
            | ApiError::BadRequest(code, _)
            | ApiError::NotFound(code, _) => *code,
            ApiError::Internal(_) => "INTERNAL",
            ApiError::Hinted(inner, _) => inner.code(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Unauthorized(_, msg)
            | ApiError::Forbidden(_, msg)
            | ApiError::BadRequest(_, msg)
            | ApiError::NotFound(_, msg) => msg,
            ApiError::Internal(_) => "Internal server error",
            ApiError::Hinted(inner, _) => inner.message(),
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            ApiError::Hinted(_, hint) => Some(hint),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "internal error");
        }
        let body = ErrorResponse {
            detail: self.message().to_string(),
            code: self.code().to_string(),
            hint: self.hint().map(str::to_string),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        if rejection.status().is_server_error() {
            return ApiError::Internal(rejection.body_text());
        }
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

/* ============================================================
   Procedure failures
   ============================================================ */

struct Translation {
    code: &'static str,
    message: &'static str,
    hint: Option<&'static str>,
}

fn t(code: &'static str, message: &'static str, hint: Option<&'static str>) -> Translation {
    Translation {
        code,
        message,
        hint,
    }
}

fn translation(kind: DomainErrorKind) -> Translation {
    use DomainErrorKind::*;

    match kind {
        DoctorNotRegistered => t("DOCTOR_NOT_REGISTERED", "user not registered as doctor",
            Some("Complete the doctor profile before using doctor features.")),
        PatientNotRegistered => t("PATIENT_NOT_REGISTERED", "user not registered as patient",
            Some("Complete the patient profile first.")),
        AppointmentNotFound => t("APPOINTMENT_NOT_FOUND", "appointment does not exist", None),
        DocumentNotFound => t("DOCUMENT_NOT_FOUND", "document does not exist", None),
        ClinicalRecordNotFound => t("CLINICAL_RECORD_NOT_FOUND", "clinical record does not exist", None),
        PatientHasNoRecord => t("CLINICAL_RECORD_NOT_FOUND", "patient has no clinical record", None),
        ClinicalEntryNotFound => t("CLINICAL_ENTRY_NOT_FOUND", "clinical entry does not exist", None),
        PatientNotFound => t("PATIENT_NOT_FOUND", "patient does not exist", None),
        DoctorNotFound => t("DOCTOR_NOT_FOUND", "doctor does not exist", None),
        SpecialtyNotFound => t("SPECIALTY_NOT_FOUND", "specialty does not exist", None),
        NotRegistered => t("NOT_REGISTERED", "user is not registered for this role", None),
        NotFound => t("NOT_FOUND", "resource does not exist", None),

        AdminNotRegistered => t("ADMIN_NOT_REGISTERED", "user not registered as administrator", None),
        DoctorDeactivated => t("DOCTOR_DEACTIVATED", "doctor account is deactivated",
            Some("Contact an administrator to reactivate the account.")),
        PatientDeactivated => t("PATIENT_DEACTIVATED", "patient account is deactivated",
            Some("Contact an administrator to reactivate the account.")),
        DoctorNotApproved => t("DOCTOR_NOT_APPROVED", "doctor is not approved yet",
            Some("All required documents must be approved by an administrator.")),
        DocumentsNotApproved => t("DOCUMENTS_NOT_APPROVED", "doctor documentation has not been approved",
            Some("All required documents must be approved by an administrator.")),
        SlotNotOwned => t("SLOT_NOT_OWNED", "schedule slot does not belong to this doctor", None),
        NotAssignedDoctor => t("NOT_ASSIGNED_DOCTOR", "only the assigned doctor can perform this action", None),
        NotEntryAuthor => t("NOT_ENTRY_AUTHOR", "only the doctor who created the entry can modify it", None),
        NotParticipant => t("NOT_PARTICIPANT", "you do not have permission for this appointment", None),
        AccountDeactivated => t("ACCOUNT_DEACTIVATED", "account is deactivated", None),

        SlotUnavailable => t("SLOT_UNAVAILABLE", "schedule slot is no longer available",
            Some("Choose another available slot.")),
        DoubleBooking => t("DOUBLE_BOOKING", "patient already has an appointment scheduled at that time",
            Some("Cancel the existing appointment or pick another time.")),
        AlreadyCancelled => t("ALREADY_CANCELLED", "appointment is already cancelled", None),
        AlreadyCompleted => t("ALREADY_COMPLETED", "appointment is already completed", None),
        CompletedNotCancellable => t("INVALID_TRANSITION", "a completed appointment cannot be cancelled", None),
        CancelledNotCompletable => t("INVALID_TRANSITION", "a cancelled appointment cannot be completed", None),
        CannotAcceptClosed => t("INVALID_TRANSITION", "a cancelled or completed appointment cannot be accepted", None),
        NotPending => t("INVALID_TRANSITION", "appointment is not pending", None),
        EntryAlreadyExists => t("ENTRY_ALREADY_EXISTS", "a clinical entry already exists for this appointment", None),
        DuplicateDocument => t("DUPLICATE_DOCUMENT", "document already uploaded", None),
        DuplicateEmail => t("DUPLICATE_EMAIL", "email is already in use", None),
        AlreadyExists => t("ALREADY_EXISTS", "resource already exists", Some("Check the name.")),
        HasDependents => t("HAS_DEPENDENTS", "resource has associated documents",
            Some("Remove the associated documents first.")),

        PastDate => t("PAST_DATE", "dates in the past are not allowed", None),
        HoursOutOfRange => t("HOURS_OUT_OF_RANGE", "hours are outside the allowed range", None),
        EndBeforeStart => t("END_BEFORE_START", "end time must be after start time", None),
        InvalidEmail => t("INVALID_EMAIL", "invalid email format", None),
        AppointmentNotCompleted => t("APPOINTMENT_NOT_COMPLETED",
            "clinical entries can only be created for completed appointments", None),
        DocumentTypeNotFound => t("DOCUMENT_TYPE_NOT_FOUND", "document type does not exist", None),

        Unclassified => t("PROCEDURE_ERROR", "", None),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let tr = translation(err.kind);
        let message = if err.kind == DomainErrorKind::Unclassified {
            tracing::warn!(raw = %err.message, "unclassified procedure error");
            err.message
        } else {
            tr.message.to_string()
        };

        // Conflicts go out as 400, the status clients of these procedures expect.
        let base = match err.kind.class() {
            ErrorClass::NotFound => ApiError::NotFound(tr.code, message),
            ErrorClass::Forbidden => ApiError::Forbidden(tr.code, message),
            ErrorClass::Conflict | ErrorClass::Validation => ApiError::BadRequest(tr.code, message),
        };
        match tr.hint {
            Some(hint) => base.with_hint(hint),
            None => base,
        }
    }
}

impl From<ProcedureError> for ApiError {
    fn from(err: ProcedureError) -> Self {
        match err {
            ProcedureError::Domain(d) => d.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedures::domain_error::classify;
    use rstest::rstest;

    #[test]
    fn doctor_not_registered_is_not_found() {
        let api: ApiError = classify("el usuario no está registrado como médico").into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
        assert_eq!(api.message(), "user not registered as doctor");
    }

    #[test]
    fn double_booking_is_reported_as_bad_request() {
        let api: ApiError = classify("ya tiene una cita programada").into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.code(), "DOUBLE_BOOKING");
        assert!(api.message().contains("already has an appointment"));
    }

    #[test]
    fn unmatched_text_is_echoed() {
        let api: ApiError = classify("Error inesperado en el procedimiento").into();
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.message(), "Error inesperado en el procedimiento");
        assert_eq!(api.hint(), None);
    }

    #[test]
    fn transport_failures_are_internal() {
        let api: ApiError = ProcedureError::Transport("pool timed out".into()).into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api.message(), "Internal server error");
    }

    #[rstest]
    #[case("El horario ya no está disponible", StatusCode::BAD_REQUEST, true)]
    #[case("El médico no está aprobado", StatusCode::FORBIDDEN, true)]
    #[case("La cita no existe", StatusCode::NOT_FOUND, false)]
    #[case("El usuario no está registrado como administrador", StatusCode::FORBIDDEN, false)]
    fn every_kind_maps_to_one_status(
        #[case] raw: &str,
        #[case] status: StatusCode,
        #[case] hinted: bool,
    ) {
        let api: ApiError = classify(raw).into();
        assert_eq!(api.status(), status);
        assert_eq!(api.hint().is_some(), hinted);
    }

    #[tokio::test]
    async fn body_carries_detail_code_and_hint() {
        let resp = ApiError::Forbidden("FORBIDDEN", "not yours".into())
            .with_hint("your user id is 2")
            .into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["detail"], "not yours");
        assert_eq!(body["code"], "FORBIDDEN");
        assert_eq!(body["hint"], "your user id is 2");
    }
}
