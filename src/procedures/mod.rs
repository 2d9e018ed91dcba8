//! Boundary to the stored-procedure layer.
//!
//! Handlers describe a call as a [`ProcedureCall`] (a procedure from the closed
//! [`Procedure`] catalog plus positional [`Param`]s) and say which result
//! [`Shape`] they expect. An implementation of [`ProcedureInvoker`] executes the
//! call exactly once and hands back a normalized [`Output`] or a
//! [`ProcedureError`].

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod domain_error;
pub mod mysql;

pub use domain_error::{DomainError, DomainErrorKind, ErrorClass};

/// One result row, keyed by snake_case column name.
pub type Row = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    AgendaCreateRange,
    AgendaToggleSlot,
    AgendaListByUser,
    AgendaListAvailableByUser,

    AppointmentCreate,
    AppointmentCancel,
    AppointmentAccept,
    AppointmentComplete,
    AppointmentListPatient,
    AppointmentListDoctor,

    ClinicalRecordGetByPatient,
    ClinicalRecordUpdateHistory,
    ClinicalRecordFullByPatient,

    ClinicalEntryCreate,
    ClinicalEntryUpdate,
    ClinicalEntryGet,
    ClinicalEntryListByPatient,
    ClinicalEntryListByDoctor,

    DocumentUpload,
    DocumentValidate,
    DocumentListByUser,

    DocumentTypeCreate,
    DocumentTypeUpdate,
    DocumentTypeDelete,
    DocumentTypeGet,
    DocumentTypeList,

    SpecialtyCreate,
    SpecialtyList,
    DoctorSpecialtyAssign,
    DoctorSpecialtyList,

    DictionaryCreate,
    DictionaryUpdate,
    DictionaryDelete,
    DictionaryGet,
    DictionaryList,
    DictionarySearch,

    NotificationListPatient,
    NotificationListDoctor,

    VideoCallCreate,
    VideoCallGet,

    UserCreate,
    UserUpdate,
    UserGet,
    UserList,
    UserDeactivate,
    UserActivate,

    PatientGetByUser,
    PatientList,
    PatientUpdate,

    DoctorGetByUser,
    DoctorList,
    DoctorListByStatus,
    DoctorUpdate,
    DoctorStatus,

    AdminGetIdByUser,
}

impl Procedure {
    pub fn name(self) -> &'static str {
        use Procedure::*;
        match self {
            AgendaCreateRange => "sp_agenda_create_range",
            AgendaToggleSlot => "sp_agenda_toggle_slot",
            AgendaListByUser => "sp_agenda_list_by_usuario",
            AgendaListAvailableByUser => "sp_agenda_list_disponible_by_usuario",

            AppointmentCreate => "sp_cita_create",
            AppointmentCancel => "sp_cita_cancelar",
            AppointmentAccept => "sp_cita_aceptar",
            AppointmentComplete => "sp_cita_completar",
            AppointmentListPatient => "sp_cita_list_paciente",
            AppointmentListDoctor => "sp_cita_list_medico",

            ClinicalRecordGetByPatient => "sp_historia_clinica_get_by_paciente",
            ClinicalRecordUpdateHistory => "sp_historia_clinica_update_antecedentes",
            ClinicalRecordFullByPatient => "sp_historia_completa_by_paciente",

            ClinicalEntryCreate => "sp_historia_entrada_create",
            ClinicalEntryUpdate => "sp_historia_entrada_update",
            ClinicalEntryGet => "sp_historia_entrada_get",
            ClinicalEntryListByPatient => "sp_historia_entrada_list_by_paciente",
            ClinicalEntryListByDoctor => "sp_historia_entrada_list_by_medico",

            DocumentUpload => "sp_documento_upload",
            DocumentValidate => "sp_documento_validate",
            DocumentListByUser => "sp_documento_list_by_usuario",

            DocumentTypeCreate => "sp_tipodoc_create",
            DocumentTypeUpdate => "sp_tipodoc_update",
            DocumentTypeDelete => "sp_tipodoc_delete",
            DocumentTypeGet => "sp_tipodoc_get",
            DocumentTypeList => "sp_tipodoc_list",

            SpecialtyCreate => "sp_especialidad_create",
            SpecialtyList => "sp_especialidad_list",
            DoctorSpecialtyAssign => "sp_medico_especialidad_asignar",
            DoctorSpecialtyList => "sp_medico_especialidad_list",

            DictionaryCreate => "sp_diccionario_create",
            DictionaryUpdate => "sp_diccionario_update",
            DictionaryDelete => "sp_diccionario_delete",
            DictionaryGet => "sp_diccionario_get",
            DictionaryList => "sp_diccionario_list",
            DictionarySearch => "sp_diccionario_search",

            NotificationListPatient => "sp_notificacion_list_paciente",
            NotificationListDoctor => "sp_notificacion_list_medico",

            VideoCallCreate => "sp_videollamada_crear",
            VideoCallGet => "sp_videollamada_get",

            UserCreate => "sp_usuario_create",
            UserUpdate => "sp_usuario_update",
            UserGet => "sp_usuario_get",
            UserList => "sp_usuario_list",
            UserDeactivate => "sp_usuario_deactivate",
            UserActivate => "sp_usuario_activate",

            PatientGetByUser => "sp_paciente_get_by_usuario",
            PatientList => "sp_paciente_list",
            PatientUpdate => "sp_paciente_update",

            DoctorGetByUser => "sp_medico_get_by_usuario",
            DoctorList => "sp_medico_list",
            DoctorListByStatus => "sp_medico_list_by_estado",
            DoctorUpdate => "sp_medico_update",
            DoctorStatus => "sp_medico_estado",

            AdminGetIdByUser => "sp_admin_get_id_by_usuario",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Int(i64),
    OptInt(Option<i64>),
    Text(String),
    OptText(Option<String>),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Int(v)
    }
}

impl From<Option<i64>> for Param {
    fn from(v: Option<i64>) -> Self {
        Param::OptInt(v)
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_string())
    }
}

impl From<Option<String>> for Param {
    fn from(v: Option<String>) -> Self {
        Param::OptText(v)
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Bool(v)
    }
}

impl From<NaiveDate> for Param {
    fn from(v: NaiveDate) -> Self {
        Param::Date(v)
    }
}

impl From<NaiveTime> for Param {
    fn from(v: NaiveTime) -> Self {
        Param::Time(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    pub procedure: Procedure,
    pub params: Vec<Param>,
}

impl ProcedureCall {
    pub fn new(procedure: Procedure) -> Self {
        Self {
            procedure,
            params: Vec::new(),
        }
    }

    pub fn arg(mut self, p: impl Into<Param>) -> Self {
        self.params.push(p.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// First column of the first row.
    Scalar,
    Row,
    Rows,
    /// First result set holds one primary row, the second its dependents.
    PrimaryWithDependent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Scalar(Option<Value>),
    Row(Option<Row>),
    Rows(Vec<Row>),
    PrimaryWithDependent(Option<(Row, Vec<Row>)>),
}

#[derive(Debug, thiserror::Error)]
pub enum ProcedureError {
    #[error("{0}")]
    Domain(DomainError),
    #[error("procedure transport error: {0}")]
    Transport(String),
    #[error("could not decode result of {procedure}: {reason}")]
    Decode {
        procedure: &'static str,
        reason: String,
    },
}

impl ProcedureError {
    fn decode(procedure: Procedure, reason: impl ToString) -> Self {
        ProcedureError::Decode {
            procedure: procedure.name(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
pub trait ProcedureInvoker: Send + Sync {
    async fn invoke(&self, call: ProcedureCall, shape: Shape) -> Result<Output, ProcedureError>;
}

/// Numeric scalars come back as numbers or, for DECIMAL columns, as text.
pub fn value_as_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok())),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Typed helpers over the raw [`Output`] enum.
impl dyn ProcedureInvoker {
    pub async fn scalar(&self, call: ProcedureCall) -> Result<Option<Value>, ProcedureError> {
        let procedure = call.procedure;
        match self.invoke(call, Shape::Scalar).await? {
            Output::Scalar(v) => Ok(v.filter(|v| !v.is_null())),
            other => Err(ProcedureError::decode(procedure, format!("expected scalar, got {other:?}"))),
        }
    }

    /// Ids, counts and affected-row totals. A missing value reads as 0.
    pub async fn scalar_i64(&self, call: ProcedureCall) -> Result<i64, ProcedureError> {
        let procedure = call.procedure;
        match self.scalar(call).await? {
            None => Ok(0),
            Some(v) => value_as_i64(&v)
                .ok_or_else(|| ProcedureError::decode(procedure, format!("not an integer: {v}"))),
        }
    }

    pub async fn scalar_text(&self, call: ProcedureCall) -> Result<Option<String>, ProcedureError> {
        Ok(self.scalar(call).await?.map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    pub async fn row<T: DeserializeOwned>(
        &self,
        call: ProcedureCall,
    ) -> Result<Option<T>, ProcedureError> {
        let procedure = call.procedure;
        match self.invoke(call, Shape::Row).await? {
            Output::Row(None) => Ok(None),
            Output::Row(Some(row)) => serde_json::from_value(Value::Object(row))
                .map(Some)
                .map_err(|e| ProcedureError::decode(procedure, e)),
            other => Err(ProcedureError::decode(procedure, format!("expected row, got {other:?}"))),
        }
    }

    pub async fn rows<T: DeserializeOwned>(
        &self,
        call: ProcedureCall,
    ) -> Result<Vec<T>, ProcedureError> {
        let procedure = call.procedure;
        match self.invoke(call, Shape::Rows).await? {
            Output::Rows(rows) => rows
                .into_iter()
                .map(|r| serde_json::from_value(Value::Object(r)))
                .collect::<Result<Vec<T>, _>>()
                .map_err(|e| ProcedureError::decode(procedure, e)),
            other => Err(ProcedureError::decode(procedure, format!("expected rows, got {other:?}"))),
        }
    }

    pub async fn primary_with_dependent<P: DeserializeOwned, D: DeserializeOwned>(
        &self,
        call: ProcedureCall,
    ) -> Result<Option<(P, Vec<D>)>, ProcedureError> {
        let procedure = call.procedure;
        match self.invoke(call, Shape::PrimaryWithDependent).await? {
            Output::PrimaryWithDependent(None) => Ok(None),
            Output::PrimaryWithDependent(Some((primary, dependents))) => {
                let primary = serde_json::from_value(Value::Object(primary))
                    .map_err(|e| ProcedureError::decode(procedure, e))?;
                let dependents = dependents
                    .into_iter()
                    .map(|r| serde_json::from_value(Value::Object(r)))
                    .collect::<Result<Vec<D>, _>>()
                    .map_err(|e| ProcedureError::decode(procedure, e))?;
                Ok(Some((primary, dependents)))
            }
            other => Err(ProcedureError::decode(
                procedure,
                format!("expected primary with dependents, got {other:?}"),
            )),
        }
    }
}
