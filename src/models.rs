use std::sync::Arc;

use serde::Serialize;

use crate::accounts::AccountStore;
use crate::procedures::ProcedureInvoker;

#[derive(Clone)]
pub struct AppState {
    pub procedures: Arc<dyn ProcedureInvoker>,
    pub accounts: Arc<dyn AccountStore>,
    pub session_ttl_hours: i64,
    pub remember_me_ttl_hours: i64,
}

/* -------------------------
   Response envelopes
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize)]
pub struct OkData {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OkData {
    pub fn done() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedId {
    pub id: i64,
}
