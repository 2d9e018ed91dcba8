//! In-memory stand-ins for the procedure layer and the account tables.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

use crate::accounts::{AccountStore, ActiveSession, AppointmentParticipants, CredentialsRow};
use crate::auth::hash_access_token;
use crate::authz::{Principal, Role};
use crate::error::ApiError;
use crate::models::AppState;
use crate::procedures::domain_error::classify;
use crate::procedures::{
    Output, Procedure, ProcedureCall, ProcedureError, ProcedureInvoker, Row, Shape,
};

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Output),
    Raise(String),
}

/// Records every call. Scripted replies are consumed in order; the last one
/// sticks. Unscripted procedures answer with an empty result of the asked shape.
#[derive(Clone, Default)]
pub struct FakeProcedures {
    calls: Arc<Mutex<Vec<ProcedureCall>>>,
    script: Arc<Mutex<HashMap<Procedure, VecDeque<Scripted>>>>,
}

impl FakeProcedures {
    fn push(self, procedure: Procedure, s: Scripted) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(procedure)
            .or_default()
            .push_back(s);
        self
    }

    pub fn reply(self, procedure: Procedure, output: Output) -> Self {
        self.push(procedure, Scripted::Reply(output))
    }

    pub fn scalar(self, procedure: Procedure, value: Value) -> Self {
        self.reply(procedure, Output::Scalar(Some(value)))
    }

    pub fn row(self, procedure: Procedure, value: Value) -> Self {
        self.reply(procedure, Output::Row(Some(obj(value))))
    }

    pub fn rows(self, procedure: Procedure, values: Vec<Value>) -> Self {
        self.reply(procedure, Output::Rows(values.into_iter().map(obj).collect()))
    }

    pub fn raise(self, procedure: Procedure, message: &str) -> Self {
        self.push(procedure, Scripted::Raise(message.to_string()))
    }

    pub fn calls(&self) -> Vec<ProcedureCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

pub fn obj(v: Value) -> Row {
    match v {
        Value::Object(m) => m,
        other => panic!("expected object, got {other}"),
    }
}

#[async_trait]
impl ProcedureInvoker for FakeProcedures {
    async fn invoke(&self, call: ProcedureCall, shape: Shape) -> Result<Output, ProcedureError> {
        let procedure = call.procedure;
        self.calls.lock().unwrap().push(call);

        let scripted = {
            let mut script = self.script.lock().unwrap();
            match script.get_mut(&procedure) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Reply(out)) => Ok(out),
            Some(Scripted::Raise(msg)) => Err(ProcedureError::Domain(classify(&msg))),
            None => Ok(match shape {
                Shape::Scalar => Output::Scalar(None),
                Shape::Row => Output::Row(None),
                Shape::Rows => Output::Rows(Vec::new()),
                Shape::PrimaryWithDependent => Output::PrimaryWithDependent(None),
            }),
        }
    }
}

#[derive(Default)]
struct AccountsInner {
    sessions: HashMap<String, ActiveSession>,
    credentials: Vec<CredentialsRow>,
    profiles: HashMap<(Role, i64), i64>,
    participants: HashMap<i64, AppointmentParticipants>,
    next_session: i64,
    revoked: Vec<i64>,
    lookups: usize,
}

#[derive(Clone, Default)]
pub struct FakeAccounts {
    inner: Arc<Mutex<AccountsInner>>,
}

impl FakeAccounts {
    pub fn with_session(self, token: &str, user_id: i64, role: Role) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            inner.next_session += 1;
            let session_id = inner.next_session;
            inner.sessions.insert(
                hash_access_token(token),
                ActiveSession {
                    session_id,
                    user_id,
                    role,
                    expires_at: Utc::now() + Duration::hours(1),
                },
            );
        }
        self
    }

    pub fn with_user(self, user_id: i64, email: &str, password_hash: &str, role: Role, active: bool) -> Self {
        self.inner.lock().unwrap().credentials.push(CredentialsRow {
            id_usuario: user_id,
            nombre: Some("Ana".into()),
            apellidos: Some("Rojas".into()),
            correo: Some(email.to_string()),
            contrasena: Some(password_hash.to_string()),
            rol: role.as_db_str().to_string(),
            activo: active,
            motivo_inactivacion: (!active).then(|| "Licencia vencida".to_string()),
        });
        self
    }

    pub fn with_profile(self, role: Role, user_id: i64, profile_id: i64) -> Self {
        self.inner
            .lock()
            .unwrap()
            .profiles
            .insert((role, user_id), profile_id);
        self
    }

    pub fn with_participants(self, appointment_id: i64, patient_user_id: i64, doctor_user_id: i64) -> Self {
        self.inner.lock().unwrap().participants.insert(
            appointment_id,
            AppointmentParticipants {
                patient_user_id,
                doctor_user_id,
            },
        );
        self
    }

    /// Profile and participant lookups made so far.
    pub fn lookups(&self) -> usize {
        self.inner.lock().unwrap().lookups
    }

    pub fn revoked(&self) -> Vec<i64> {
        self.inner.lock().unwrap().revoked.clone()
    }

    pub fn stored_hash(&self, user_id: i64) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .credentials
            .iter()
            .find(|c| c.id_usuario == user_id)
            .and_then(|c| c.contrasena.clone())
    }
}

#[async_trait]
impl AccountStore for FakeAccounts {
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<ActiveSession>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .sessions
            .get(token_hash)
            .filter(|s| !inner.revoked.contains(&s.session_id))
            .cloned())
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<CredentialsRow>, ApiError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .credentials
            .iter()
            .find(|c| c.correo.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(email)))
            .cloned())
    }

    async fn password_hash(&self, user_id: i64) -> Result<Option<String>, ApiError> {
        Ok(self.stored_hash(user_id))
    }

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let role = inner
            .credentials
            .iter()
            .find(|c| c.id_usuario == user_id)
            .and_then(|c| Role::from_db(&c.rol))
            .unwrap_or(Role::Patient);
        inner.next_session += 1;
        let session_id = inner.next_session;
        inner.sessions.insert(
            token_hash.to_string(),
            ActiveSession {
                session_id,
                user_id,
                role,
                expires_at,
            },
        );
        Ok(session_id)
    }

    async fn revoke_session(&self, session_id: i64, _user_id: i64) -> Result<bool, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.revoked.contains(&session_id) {
            return Ok(false);
        }
        inner.revoked.push(session_id);
        Ok(true)
    }

    async fn rotate_session(
        &self,
        session_id: i64,
        _user_id: i64,
        new_hash: &str,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(old) = inner
            .sessions
            .iter()
            .find(|(_, s)| s.session_id == session_id)
            .map(|(k, _)| k.clone())
        else {
            return Ok(None);
        };
        let session = inner.sessions.remove(&old);
        Ok(session.map(|s| {
            let expires_at = s.expires_at;
            inner.sessions.insert(new_hash.to_string(), s);
            expires_at
        }))
    }

    async fn update_password(
        &self,
        user_id: i64,
        new_hash: &str,
        keep_session_id: i64,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(c) = inner.credentials.iter_mut().find(|c| c.id_usuario == user_id) {
            c.contrasena = Some(new_hash.to_string());
        }
        let others: Vec<i64> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id && s.session_id != keep_session_id)
            .map(|s| s.session_id)
            .collect();
        inner.revoked.extend(others);
        Ok(())
    }

    async fn profile_id(&self, role: Role, user_id: i64) -> Result<Option<i64>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.lookups += 1;
        Ok(inner.profiles.get(&(role, user_id)).copied())
    }

    async fn appointment_participants(
        &self,
        appointment_id: i64,
    ) -> Result<Option<AppointmentParticipants>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.lookups += 1;
        Ok(inner.participants.get(&appointment_id).copied())
    }
}

pub fn state_with(procedures: FakeProcedures, accounts: FakeAccounts) -> AppState {
    AppState {
        procedures: Arc::new(procedures),
        accounts: Arc::new(accounts),
        session_ttl_hours: 1,
        remember_me_ttl_hours: 24,
    }
}

pub fn principal(user_id: i64, role: Role) -> Principal {
    Principal {
        user_id,
        role,
        session_id: 100 + user_id,
    }
}

/// A state where users 2 (doctor), 3 (patient) and 1 (administrator) all have
/// their role profiles.
pub fn clinic_accounts() -> FakeAccounts {
    FakeAccounts::default()
        .with_profile(Role::Doctor, 2, 20)
        .with_profile(Role::Patient, 3, 30)
        .with_profile(Role::Administrator, 1, 10)
}

pub fn sample_user(id: i64, role: Role) -> Value {
    json!({
        "id_usuario": id,
        "nombre": "Ana",
        "apellidos": "Rojas",
        "documento": "1020",
        "correo": "ana@example.com",
        "telefono": "3001234567",
        "rol": role.as_db_str(),
        "activo": true,
        "motivo_inactivacion": null,
        "fecha_inactivacion": null
    })
}
