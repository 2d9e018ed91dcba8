//! Role gate and ownership checks.
//!
//! Every endpoint is an [`Operation`]. Its required [`Capability`] is checked
//! before anything else runs, then its [`Ownership`] rule is checked against the
//! identity the request claims to act on. Both checks are pure; the only store
//! access here is the profile lookup in [`authorize`], which runs after both
//! checks have passed.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Paciente")]
    Patient,
    #[serde(rename = "Medico")]
    Doctor,
    #[serde(rename = "Administrador")]
    Administrator,
}

impl Role {
    /// Parses the `usuario.Rol` column.
    pub fn from_db(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "paciente" => Some(Role::Patient),
            "medico" | "médico" => Some(Role::Doctor),
            "administrador" => Some(Role::Administrator),
            _ => None,
        }
    }

    pub fn as_db_str(self) -> &'static str {
        match self {
            Role::Patient => "Paciente",
            Role::Doctor => "Medico",
            Role::Administrator => "Administrador",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Administrator => "administrator",
        }
    }
}

/// The authenticated caller. Resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub role: Role,
    pub session_id: i64,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Anonymous,
    Authenticated,
    Role(Role),
    AnyOf(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    None,
    /// Caller must hold the role and be the named identity.
    Target(Role),
    /// Caller must be the named identity, whatever their role.
    Participant,
    /// Only callers holding the role are restricted to their own identity.
    ScopedFor(Role),
    /// The named identity records who performed the action; it must be the
    /// caller, administrators included.
    Actor,
}

const DOCTOR_OR_ADMIN: &[Role] = &[Role::Doctor, Role::Administrator];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AuthLogin,
    AuthLogout,
    AuthMe,
    AuthChangePassword,
    AuthRefresh,

    UserRegister,
    UserList,
    UserGet,
    UserUpdate,
    UserDeactivate,
    UserActivate,

    PatientList,
    PatientGet,
    PatientUpdate,

    DoctorList,
    DoctorGet,
    DoctorUpdate,
    DoctorStatus,
    DoctorListByStatus,

    AdminLookup,

    DocumentTypeList,
    DocumentTypeGet,
    DocumentTypeCreate,
    DocumentTypeUpdate,
    DocumentTypeDelete,

    DocumentList,
    DocumentUpload,
    DocumentValidate,

    ScheduleCreateRange,
    ScheduleList,
    ScheduleListAvailable,
    ScheduleToggleSlot,

    AppointmentCreate,
    AppointmentCancel,
    AppointmentAccept,
    AppointmentComplete,
    AppointmentListPatient,
    AppointmentListDoctor,

    ClinicalRecordGet,
    ClinicalRecordUpdateHistory,
    ClinicalRecordFull,

    ClinicalEntryCreate,
    ClinicalEntryUpdate,
    ClinicalEntryGet,
    ClinicalEntryListPatient,
    ClinicalEntryListDoctor,

    DictionaryList,
    DictionarySearch,
    DictionaryGet,
    DictionaryCreate,
    DictionaryUpdate,
    DictionaryDelete,

    SpecialtyList,
    SpecialtyCreate,
    SpecialtyAssign,
    SpecialtyListDoctor,

    NotificationListPatient,
    NotificationListDoctor,

    VideoCallCreate,
    VideoCallGet,
}

impl Operation {
    pub fn capability(self) -> Capability {
        use Operation::*;
        match self {
            AuthLogin | UserRegister | DoctorList | DoctorGet | DoctorStatus
            | DoctorListByStatus | DocumentTypeList | DocumentTypeGet | ScheduleList
            | ScheduleListAvailable | DictionaryList | DictionarySearch | DictionaryGet
            | SpecialtyList | SpecialtyListDoctor => Capability::Anonymous,

            AuthLogout | AuthMe | AuthChangePassword | AuthRefresh | UserGet | UserUpdate
            | PatientGet | PatientUpdate | DoctorUpdate | AdminLookup | DocumentList
            | AppointmentCancel | AppointmentListPatient | AppointmentListDoctor
            | ClinicalRecordGet | ClinicalEntryGet | ClinicalEntryListPatient
            | ClinicalEntryListDoctor | NotificationListPatient | NotificationListDoctor
            | VideoCallGet => Capability::Authenticated,

            UserList | UserDeactivate | UserActivate | PatientList | DocumentTypeCreate
            | DocumentTypeUpdate | DocumentTypeDelete | DocumentValidate | DictionaryCreate
            | DictionaryUpdate | DictionaryDelete | SpecialtyCreate | SpecialtyAssign => {
                Capability::Role(Role::Administrator)
            }

            DocumentUpload | ScheduleCreateRange | ClinicalRecordUpdateHistory
            | ClinicalRecordFull | ClinicalEntryCreate | ClinicalEntryUpdate
            | VideoCallCreate => Capability::Role(Role::Doctor),

            AppointmentCreate => Capability::Role(Role::Patient),

            ScheduleToggleSlot | AppointmentAccept | AppointmentComplete => Capability::AnyOf(DOCTOR_OR_ADMIN),
        }
    }

    pub fn ownership(self) -> Ownership {
        use Operation::*;
        match self {
            UserGet | UserUpdate | AppointmentCancel | AppointmentListPatient
            | AppointmentListDoctor => Ownership::Participant,

            PatientGet | PatientUpdate | ClinicalRecordGet | ClinicalEntryListPatient
            | NotificationListPatient => Ownership::ScopedFor(Role::Patient),

            DoctorUpdate | DocumentList | ClinicalEntryListDoctor | NotificationListDoctor => {
                Ownership::ScopedFor(Role::Doctor)
            }

            DocumentUpload | ScheduleCreateRange | ScheduleToggleSlot | AppointmentAccept
            | AppointmentComplete | ClinicalRecordUpdateHistory | ClinicalRecordFull
            | ClinicalEntryCreate | ClinicalEntryUpdate => Ownership::Target(Role::Doctor),

            AppointmentCreate => Ownership::Target(Role::Patient),

            DocumentValidate | DictionaryCreate | DictionaryUpdate | DictionaryDelete => {
                Ownership::Actor
            }

            _ => Ownership::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        use Operation::*;
        match self {
            AuthLogin => "auth.login",
            AuthLogout => "auth.logout",
            AuthMe => "auth.me",
            AuthChangePassword => "auth.change_password",
            AuthRefresh => "auth.refresh",
            UserRegister => "user.register",
            UserList => "user.list",
            UserGet => "user.get",
            UserUpdate => "user.update",
            UserDeactivate => "user.deactivate",
            UserActivate => "user.activate",
            PatientList => "patient.list",
            PatientGet => "patient.get",
            PatientUpdate => "patient.update",
            DoctorList => "doctor.list",
            DoctorGet => "doctor.get",
            DoctorUpdate => "doctor.update",
            DoctorStatus => "doctor.status",
            DoctorListByStatus => "doctor.list_by_status",
            AdminLookup => "admin.lookup",
            DocumentTypeList => "document_type.list",
            DocumentTypeGet => "document_type.get",
            DocumentTypeCreate => "document_type.create",
            DocumentTypeUpdate => "document_type.update",
            DocumentTypeDelete => "document_type.delete",
            DocumentList => "document.list",
            DocumentUpload => "document.upload",
            DocumentValidate => "document.validate",
            ScheduleCreateRange => "schedule.create_range",
            ScheduleList => "schedule.list",
            ScheduleListAvailable => "schedule.list_available",
            ScheduleToggleSlot => "schedule.toggle_slot",
            AppointmentCreate => "appointment.create",
            AppointmentCancel => "appointment.cancel",
            AppointmentAccept => "appointment.accept",
            AppointmentComplete => "appointment.complete",
            AppointmentListPatient => "appointment.list_patient",
            AppointmentListDoctor => "appointment.list_doctor",
            ClinicalRecordGet => "clinical_record.get",
            ClinicalRecordUpdateHistory => "clinical_record.update_history",
            ClinicalRecordFull => "clinical_record.full",
            ClinicalEntryCreate => "clinical_entry.create",
            ClinicalEntryUpdate => "clinical_entry.update",
            ClinicalEntryGet => "clinical_entry.get",
            ClinicalEntryListPatient => "clinical_entry.list_patient",
            ClinicalEntryListDoctor => "clinical_entry.list_doctor",
            DictionaryList => "dictionary.list",
            DictionarySearch => "dictionary.search",
            DictionaryGet => "dictionary.get",
            DictionaryCreate => "dictionary.create",
            DictionaryUpdate => "dictionary.update",
            DictionaryDelete => "dictionary.delete",
            SpecialtyList => "specialty.list",
            SpecialtyCreate => "specialty.create",
            SpecialtyAssign => "specialty.assign",
            SpecialtyListDoctor => "specialty.list_doctor",
            NotificationListPatient => "notification.list_patient",
            NotificationListDoctor => "notification.list_doctor",
            VideoCallCreate => "video_call.create",
            VideoCallGet => "video_call.get",
        }
    }
}

/// Role gate. Authenticated callers that lack the role get 403.
pub fn gate(op: Operation, principal: &Principal) -> Result<(), ApiError> {
    let allowed = match op.capability() {
        Capability::Anonymous | Capability::Authenticated => true,
        Capability::Role(role) => principal.role == role,
        Capability::AnyOf(roles) => roles.contains(&principal.role),
    };
    if allowed {
        return Ok(());
    }

    tracing::info!(
        operation = op.as_str(),
        user_id = principal.user_id,
        role = principal.role.label(),
        "role gate rejected caller"
    );
    let needed = match op.capability() {
        Capability::Role(role) => role.label().to_string(),
        Capability::AnyOf(roles) => roles.iter().map(|r| r.label()).collect::<Vec<_>>().join(" or "),
        _ => String::new(),
    };
    Err(ApiError::Forbidden(
        "FORBIDDEN",
        format!("this operation requires the {needed} role"),
    ))
}

/// Ownership check against the identity the request claims to act on.
pub fn ensure_owner(op: Operation, principal: &Principal, target_user_id: i64) -> Result<(), ApiError> {
    let rule = op.ownership();
    let allowed = match rule {
        Ownership::None => true,
        Ownership::Actor => principal.user_id == target_user_id,
        _ if principal.is_admin() => true,
        Ownership::Target(role) => principal.role == role && principal.user_id == target_user_id,
        Ownership::Participant => principal.user_id == target_user_id,
        Ownership::ScopedFor(role) => principal.role != role || principal.user_id == target_user_id,
    };
    if allowed {
        return Ok(());
    }

    tracing::warn!(
        operation = op.as_str(),
        user_id = principal.user_id,
        target_user_id,
        "ownership check rejected caller"
    );
    let message = match rule {
        Ownership::Target(role) => format!(
            "you can only perform this action as yourself ({} {target_user_id} requested)",
            role.label()
        ),
        _ => format!("you can only access your own data (user {target_user_id} requested)"),
    };
    Err(ApiError::Forbidden("FORBIDDEN", message)
        .with_hint(format!("your user id is {}", principal.user_id)))
}

/// Capability check for handlers that run without a resolved principal.
/// Anything other than an anonymous operation needs a caller.
pub fn admit(op: Operation, principal: Option<&Principal>) -> Result<(), ApiError> {
    match (op.capability(), principal) {
        (Capability::Anonymous, _) => Ok(()),
        (_, Some(p)) => gate(op, p),
        (_, None) => {
            tracing::info!(operation = op.as_str(), "anonymous caller rejected");
            Err(ApiError::Unauthorized(
                "AUTHENTICATION_REQUIRED",
                "this operation requires a signed-in user".into(),
            ))
        }
    }
}

/// Gate, ownership, then the caller's role profile for `Target` and `Actor`
/// rules. A caller whose profile row is missing gets 404 rather than 403.
pub async fn authorize(
    state: &AppState,
    op: Operation,
    principal: &Principal,
    target_user_id: Option<i64>,
) -> Result<(), ApiError> {
    gate(op, principal)?;
    if let Some(target) = target_user_id {
        ensure_owner(op, principal, target)?;
    }

    let profile_role = match op.ownership() {
        Ownership::Target(role) if principal.role == role => Some(role),
        Ownership::Actor => Some(principal.role),
        _ => None,
    };
    if let Some(role) = profile_role {
        if state.accounts.profile_id(role, principal.user_id).await?.is_none() {
            return Err(ApiError::NotFound(
                "NOT_REGISTERED",
                format!("user not registered as {}", role.label()),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use rstest::rstest;

    fn caller(user_id: i64, role: Role) -> Principal {
        Principal {
            user_id,
            role,
            session_id: 1,
        }
    }

    #[rstest]
    #[case("Paciente", Some(Role::Patient))]
    #[case("Médico", Some(Role::Doctor))]
    #[case("medico", Some(Role::Doctor))]
    #[case("ADMINISTRADOR", Some(Role::Administrator))]
    #[case("Recepcionista", None)]
    fn roles_parse_from_storage(#[case] raw: &str, #[case] expected: Option<Role>) {
        assert_eq!(Role::from_db(raw), expected);
    }

    #[rstest]
    #[case(Operation::ScheduleCreateRange, Role::Patient, false)]
    #[case(Operation::ScheduleCreateRange, Role::Administrator, false)]
    #[case(Operation::ScheduleCreateRange, Role::Doctor, true)]
    #[case(Operation::ScheduleToggleSlot, Role::Administrator, true)]
    #[case(Operation::ScheduleToggleSlot, Role::Patient, false)]
    #[case(Operation::AppointmentCreate, Role::Doctor, false)]
    #[case(Operation::UserList, Role::Doctor, false)]
    #[case(Operation::UserList, Role::Administrator, true)]
    #[case(Operation::AppointmentCancel, Role::Patient, true)]
    fn gate_matrix(#[case] op: Operation, #[case] role: Role, #[case] allowed: bool) {
        let res = gate(op, &caller(9, role));
        assert_eq!(res.is_ok(), allowed);
        if let Err(e) = res {
            assert_eq!(e.status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn doctor_acting_for_another_doctor_gets_hint_with_own_id() {
        let err = ensure_owner(Operation::ScheduleCreateRange, &caller(2, Role::Doctor), 5)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.hint(), Some("your user id is 2"));
    }

    #[rstest]
    #[case(Operation::ScheduleCreateRange, Role::Doctor, 5, true)]
    #[case(Operation::AppointmentCreate, Role::Patient, 7, false)]
    #[case(Operation::PatientGet, Role::Doctor, 7, true)]
    #[case(Operation::PatientGet, Role::Patient, 7, false)]
    #[case(Operation::PatientGet, Role::Patient, 5, true)]
    #[case(Operation::UserGet, Role::Doctor, 7, false)]
    #[case(Operation::DocumentList, Role::Patient, 7, true)]
    fn ownership_matrix(
        #[case] op: Operation,
        #[case] role: Role,
        #[case] target: i64,
        #[case] allowed: bool,
    ) {
        assert_eq!(ensure_owner(op, &caller(5, role), target).is_ok(), allowed);
    }

    #[rstest]
    #[case(Operation::ScheduleToggleSlot)]
    #[case(Operation::AppointmentCreate)]
    #[case(Operation::UserGet)]
    #[case(Operation::ClinicalRecordGet)]
    fn administrators_bypass_ownership(#[case] op: Operation) {
        assert!(ensure_owner(op, &caller(1, Role::Administrator), 42).is_ok());
    }

    #[test]
    fn actor_rule_binds_administrators_too() {
        let admin = caller(1, Role::Administrator);
        assert!(ensure_owner(Operation::DocumentValidate, &admin, 1).is_ok());
        assert!(ensure_owner(Operation::DocumentValidate, &admin, 3).is_err());
    }

    #[rstest]
    #[case(Operation::DoctorList, None, true)]
    #[case(Operation::AuthLogin, None, true)]
    #[case(Operation::AuthMe, None, false)]
    #[case(Operation::UserList, None, false)]
    #[case(Operation::UserList, Some(Role::Patient), false)]
    #[case(Operation::UserList, Some(Role::Administrator), true)]
    #[case(Operation::AuthRefresh, Some(Role::Patient), true)]
    fn admit_matrix(#[case] op: Operation, #[case] role: Option<Role>, #[case] allowed: bool) {
        let p = role.map(|r| caller(4, r));
        assert_eq!(admit(op, p.as_ref()).is_ok(), allowed);
    }

    #[test]
    fn admit_without_caller_is_unauthorized() {
        let err = admit(Operation::NotificationListPatient, None).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.code(), "AUTHENTICATION_REQUIRED");
    }

    #[tokio::test]
    async fn actor_without_administrator_profile_is_not_found() {
        use crate::test_support::{FakeAccounts, FakeProcedures, state_with};

        let accounts = FakeAccounts::default();
        let state = state_with(FakeProcedures::default(), accounts.clone());
        let err = authorize(
            &state,
            Operation::DictionaryDelete,
            &caller(1, Role::Administrator),
            Some(1),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_REGISTERED");
        assert_eq!(accounts.lookups(), 1);
    }

    #[test]
    fn public_operations_need_no_principal() {
        for op in [
            Operation::DoctorList,
            Operation::SpecialtyList,
            Operation::DictionarySearch,
            Operation::DocumentTypeList,
            Operation::ScheduleListAvailable,
            Operation::AuthLogin,
            Operation::UserRegister,
        ] {
            assert_eq!(op.capability(), Capability::Anonymous, "{}", op.as_str());
        }
    }
}
