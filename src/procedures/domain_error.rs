//! Classification of failures raised inside stored procedures.
//!
//! Procedures report business-rule violations by signalling an error with a
//! human readable (Spanish) message. That text is matched exactly once, here,
//! against an ordered rule table and turned into a [`DomainErrorKind`]. Nothing
//! above the data layer looks at the raw text again.

use std::fmt;

/// How a kind surfaces to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Forbidden,
    Conflict,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    // missing entities / role membership
    DoctorNotRegistered,
    PatientNotRegistered,
    AppointmentNotFound,
    DocumentNotFound,
    ClinicalRecordNotFound,
    PatientHasNoRecord,
    ClinicalEntryNotFound,
    PatientNotFound,
    DoctorNotFound,
    SpecialtyNotFound,
    NotRegistered,
    NotFound,

    // caller may not do this
    AdminNotRegistered,
    DoctorDeactivated,
    PatientDeactivated,
    DoctorNotApproved,
    DocumentsNotApproved,
    SlotNotOwned,
    NotAssignedDoctor,
    NotEntryAuthor,
    NotParticipant,
    AccountDeactivated,

    // state collisions
    SlotUnavailable,
    DoubleBooking,
    AlreadyCancelled,
    AlreadyCompleted,
    CompletedNotCancellable,
    CancelledNotCompletable,
    CannotAcceptClosed,
    NotPending,
    EntryAlreadyExists,
    DuplicateDocument,
    DuplicateEmail,
    AlreadyExists,
    HasDependents,

    // rejected input
    PastDate,
    HoursOutOfRange,
    EndBeforeStart,
    InvalidEmail,
    AppointmentNotCompleted,
    DocumentTypeNotFound,

    Unclassified,
}

impl DomainErrorKind {
    pub fn class(self) -> ErrorClass {
        use DomainErrorKind::*;
        match self {
            DoctorNotRegistered | PatientNotRegistered | AppointmentNotFound | DocumentNotFound
            | ClinicalRecordNotFound | PatientHasNoRecord | ClinicalEntryNotFound
            | PatientNotFound | DoctorNotFound | SpecialtyNotFound | NotRegistered | NotFound => {
                ErrorClass::NotFound
            }

            AdminNotRegistered | DoctorDeactivated | PatientDeactivated | DoctorNotApproved
            | DocumentsNotApproved | SlotNotOwned | NotAssignedDoctor | NotEntryAuthor
            | NotParticipant | AccountDeactivated => ErrorClass::Forbidden,

            SlotUnavailable | DoubleBooking | AlreadyCancelled | AlreadyCompleted
            | CompletedNotCancellable | CancelledNotCompletable | CannotAcceptClosed
            | NotPending | EntryAlreadyExists | DuplicateDocument | DuplicateEmail
            | AlreadyExists | HasDependents => ErrorClass::Conflict,

            PastDate | HoursOutOfRange | EndBeforeStart | InvalidEmail
            | AppointmentNotCompleted | DocumentTypeNotFound | Unclassified => {
                ErrorClass::Validation
            }
        }
    }
}

/// A classified procedure failure. `message` is the raw text, kept for logs
/// and for echoing when the kind is [`DomainErrorKind::Unclassified`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainError {
    pub kind: DomainErrorKind,
    pub message: String,
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for DomainError {}

/// First match wins, so narrow phrases sit above the generic ones
/// ("tipo de documento no existe" before "documento no existe" before "no existe").
/// Needles are lowercase with accents folded, see [`fold`].
const RULES: &[(&[&str], DomainErrorKind)] = {
    use DomainErrorKind::*;
    &[
        (&["no esta registrado como medico"], DoctorNotRegistered),
        (&["no esta registrado como paciente"], PatientNotRegistered),
        (&["no esta registrado como administrador"], AdminNotRegistered),
        (&["medico esta desactivado"], DoctorDeactivated),
        (&["paciente esta desactivado"], PatientDeactivated),
        (&["medico no esta aprobado", "no esta validado"], DoctorNotApproved),
        (&["documentacion aprobada"], DocumentsNotApproved),
        (&["no pertenece a este medico"], SlotNotOwned),
        (&["solo el medico asignado"], NotAssignedDoctor),
        (&["solo el medico que creo la entrada"], NotEntryAuthor),
        (&["no tiene permisos"], NotParticipant),
        (&["ya no esta disponible"], SlotUnavailable),
        (&["ya tiene una cita programada"], DoubleBooking),
        (&["ya esta cancelada"], AlreadyCancelled),
        (&["ya esta completada"], AlreadyCompleted),
        (&["no se puede cancelar una cita completada"], CompletedNotCancellable),
        (&["no se puede completar una cita cancelada"], CancelledNotCompletable),
        (&["no se puede aceptar una cita"], CannotAcceptClosed),
        (&["no esta en estado pendiente", "ya esta programada"], NotPending),
        (&["ya existe una entrada de historia"], EntryAlreadyExists),
        (&["documento duplicado"], DuplicateDocument),
        (&["correo duplicado", "correo ya esta en uso"], DuplicateEmail),
        (&["tiene documentos asociados"], HasDependents),
        (&["fechas pasadas", "en el pasado"], PastDate),
        (&["horarios deben estar"], HoursOutOfRange),
        (&["hora fin"], EndBeforeStart),
        (&["formato de correo invalido"], InvalidEmail),
        (&["solo se puede crear entrada de historia para citas completadas"], AppointmentNotCompleted),
        (&["no tiene historia clinica"], PatientHasNoRecord),
        (&["historia clinica no existe"], ClinicalRecordNotFound),
        (&["entrada de historia no existe"], ClinicalEntryNotFound),
        (&["tipo de documento no existe"], DocumentTypeNotFound),
        (&["cita no existe"], AppointmentNotFound),
        (&["documento no existe"], DocumentNotFound),
        (&["especialidad no existe"], SpecialtyNotFound),
        (&["paciente no existe"], PatientNotFound),
        (&["medico no existe"], DoctorNotFound),
        (&["ya existe"], AlreadyExists),
        (&["no esta registrado"], NotRegistered),
        (&["desactivado"], AccountDeactivated),
        (&["no existe"], NotFound),
    ]
};

/// Lowercase and strip the Spanish diacritics procedures are inconsistent about.
fn fold(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' => 'a',
            'é' | 'è' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            other => other,
        })
        .collect()
}

pub fn classify(raw: &str) -> DomainError {
    let folded = fold(raw);
    let kind = RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| folded.contains(n)))
        .map(|(_, kind)| *kind)
        .unwrap_or(DomainErrorKind::Unclassified);

    DomainError {
        kind,
        message: raw.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("El usuario no está registrado como médico", DomainErrorKind::DoctorNotRegistered)]
    #[case("EL USUARIO NO ESTÁ REGISTRADO COMO PACIENTE", DomainErrorKind::PatientNotRegistered)]
    #[case("El paciente ya tiene una cita programada en ese horario", DomainErrorKind::DoubleBooking)]
    #[case("La cita ya está cancelada", DomainErrorKind::AlreadyCancelled)]
    #[case("El horario ya no está disponible", DomainErrorKind::SlotUnavailable)]
    #[case("El tipo de documento no existe", DomainErrorKind::DocumentTypeNotFound)]
    #[case("El documento no existe", DomainErrorKind::DocumentNotFound)]
    #[case("La cita no existe", DomainErrorKind::AppointmentNotFound)]
    #[case("El médico está desactivado: licencia vencida", DomainErrorKind::DoctorDeactivated)]
    #[case("Usuario desactivado", DomainErrorKind::AccountDeactivated)]
    #[case("No se pueden crear agendas en fechas pasadas", DomainErrorKind::PastDate)]
    #[case("La hora fin debe ser mayor a la hora inicio", DomainErrorKind::EndBeforeStart)]
    #[case("El registro no existe", DomainErrorKind::NotFound)]
    #[case("El paciente no tiene historia clínica", DomainErrorKind::PatientHasNoRecord)]
    #[case("medico no esta aprobado", DomainErrorKind::DoctorNotApproved)]
    fn classifies_procedure_messages(#[case] raw: &str, #[case] expected: DomainErrorKind) {
        assert_eq!(classify(raw).kind, expected);
    }

    #[test]
    fn unknown_text_is_unclassified_and_kept_verbatim() {
        let err = classify("  Deadlock found when trying to get lock ");
        assert_eq!(err.kind, DomainErrorKind::Unclassified);
        assert_eq!(err.message, "Deadlock found when trying to get lock");
    }

    #[rstest]
    #[case(DomainErrorKind::DoctorNotRegistered, ErrorClass::NotFound)]
    #[case(DomainErrorKind::AdminNotRegistered, ErrorClass::Forbidden)]
    #[case(DomainErrorKind::DoubleBooking, ErrorClass::Conflict)]
    #[case(DomainErrorKind::Unclassified, ErrorClass::Validation)]
    fn kinds_belong_to_a_class(#[case] kind: DomainErrorKind, #[case] class: ErrorClass) {
        assert_eq!(kind.class(), class);
    }
}
