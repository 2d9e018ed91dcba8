//! Direct table access for credentials, sessions and role profiles.
//!
//! Business operations go through stored procedures; this store only covers
//! the tables the procedure set does not expose (`session_token`) and the
//! lookups that authorization needs before a procedure may run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlPool;

use crate::authz::Role;
use crate::error::ApiError;

/// Session row joined with its (active) user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub session_id: i64,
    pub user_id: i64,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CredentialsRow {
    pub id_usuario: i64,
    pub nombre: Option<String>,
    pub apellidos: Option<String>,
    pub correo: Option<String>,
    pub contrasena: Option<String>,
    pub rol: String,
    pub activo: bool,
    pub motivo_inactivacion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentParticipants {
    pub patient_user_id: i64,
    pub doctor_user_id: i64,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Live session for a token hash, only while the account is active.
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<ActiveSession>, ApiError>;

    async fn find_credentials(&self, email: &str) -> Result<Option<CredentialsRow>, ApiError>;

    async fn password_hash(&self, user_id: i64) -> Result<Option<String>, ApiError>;

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, ApiError>;

    /// Returns false when the session was already gone.
    async fn revoke_session(&self, session_id: i64, user_id: i64) -> Result<bool, ApiError>;

    /// Swaps the token hash of a live session, returning its expiry.
    async fn rotate_session(
        &self,
        session_id: i64,
        user_id: i64,
        new_hash: &str,
    ) -> Result<Option<DateTime<Utc>>, ApiError>;

    /// Stores the new hash and revokes every other live session of the user.
    async fn update_password(
        &self,
        user_id: i64,
        new_hash: &str,
        keep_session_id: i64,
    ) -> Result<(), ApiError>;

    /// Doctor, patient or administrator profile id for a user.
    async fn profile_id(&self, role: Role, user_id: i64) -> Result<Option<i64>, ApiError>;

    async fn appointment_participants(
        &self,
        appointment_id: i64,
    ) -> Result<Option<AppointmentParticipants>, ApiError>;
}

pub struct MySqlAccountStore {
    db: MySqlPool,
}

impl MySqlAccountStore {
    pub fn new(db: MySqlPool) -> Self {
        Self { db }
    }
}

fn db_error(e: sqlx::Error) -> ApiError {
    ApiError::Internal(format!("db error: {e}"))
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLookupRow {
    session_id: i64,
    user_id: i64,
    rol: String,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl AccountStore for MySqlAccountStore {
    async fn resolve_session(&self, token_hash: &str) -> Result<Option<ActiveSession>, ApiError> {
        let row: Option<SessionLookupRow> = sqlx::query_as(
            r#"
            SELECT st.ID_Sesion AS session_id, st.ID_Usuario AS user_id,
                   u.Rol AS rol, st.ExpiraEn AS expires_at
            FROM session_token st
            JOIN usuario u ON u.ID_Usuario = st.ID_Usuario
            WHERE st.TokenHash = ?
              AND st.RevocadaEn IS NULL
              AND st.ExpiraEn > UTC_TIMESTAMP()
              AND u.Activo = TRUE
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        // Touch last use (best-effort)
        let _ = sqlx::query("UPDATE session_token SET UltimoUso = UTC_TIMESTAMP() WHERE ID_Sesion = ?")
            .bind(row.session_id)
            .execute(&self.db)
            .await;

        let Some(role) = Role::from_db(&row.rol) else {
            tracing::warn!(user_id = row.user_id, rol = %row.rol, "session owner has unknown role");
            return Ok(None);
        };

        Ok(Some(ActiveSession {
            session_id: row.session_id,
            user_id: row.user_id,
            role,
            expires_at: row.expires_at,
        }))
    }

    async fn find_credentials(&self, email: &str) -> Result<Option<CredentialsRow>, ApiError> {
        sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT ID_Usuario AS id_usuario, Nombre AS nombre, Apellidos AS apellidos,
                   Correo AS correo, Contrasena AS contrasena, Rol AS rol,
                   Activo AS activo, MotivoInactivacion AS motivo_inactivacion
            FROM usuario
            WHERE LOWER(Correo) = LOWER(?)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)
    }

    async fn password_hash(&self, user_id: i64) -> Result<Option<String>, ApiError> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT Contrasena FROM usuario WHERE ID_Usuario = ? AND Activo = TRUE",
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;
        Ok(row.and_then(|r| r.0))
    }

    async fn create_session(
        &self,
        user_id: i64,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        let res = sqlx::query(
            r#"
            INSERT INTO session_token (ID_Usuario, TokenHash, ExpiraEn, CreadaEn)
            VALUES (?, ?, ?, UTC_TIMESTAMP())
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(db_error)?;

        i64::try_from(res.last_insert_id())
            .map_err(|_| ApiError::Internal("session id out of range".into()))
    }

    async fn revoke_session(&self, session_id: i64, user_id: i64) -> Result<bool, ApiError> {
        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET RevocadaEn = UTC_TIMESTAMP()
            WHERE ID_Sesion = ? AND ID_Usuario = ? AND RevocadaEn IS NULL
            "#,
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(db_error)?;
        Ok(res.rows_affected() > 0)
    }

    async fn rotate_session(
        &self,
        session_id: i64,
        user_id: i64,
        new_hash: &str,
    ) -> Result<Option<DateTime<Utc>>, ApiError> {
        // MySQL has no UPDATE ... RETURNING
        let mut tx = self.db.begin().await.map_err(db_error)?;

        let res = sqlx::query(
            r#"
            UPDATE session_token
            SET TokenHash = ?, UltimoUso = UTC_TIMESTAMP()
            WHERE ID_Sesion = ? AND ID_Usuario = ?
              AND RevocadaEn IS NULL AND ExpiraEn > UTC_TIMESTAMP()
            "#,
        )
        .bind(new_hash)
        .bind(session_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }

        let row: (DateTime<Utc>,) =
            sqlx::query_as("SELECT ExpiraEn FROM session_token WHERE ID_Sesion = ?")
                .bind(session_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(Some(row.0))
    }

    async fn update_password(
        &self,
        user_id: i64,
        new_hash: &str,
        keep_session_id: i64,
    ) -> Result<(), ApiError> {
        let mut tx = self.db.begin().await.map_err(db_error)?;

        sqlx::query("UPDATE usuario SET Contrasena = ? WHERE ID_Usuario = ?")
            .bind(new_hash)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        sqlx::query(
            r#"
            UPDATE session_token
            SET RevocadaEn = UTC_TIMESTAMP()
            WHERE ID_Usuario = ? AND RevocadaEn IS NULL AND ID_Sesion <> ?
            "#,
        )
        .bind(user_id)
        .bind(keep_session_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        tx.commit().await.map_err(db_error)
    }

    async fn profile_id(&self, role: Role, user_id: i64) -> Result<Option<i64>, ApiError> {
        let sql = match role {
            Role::Doctor => "SELECT ID_Medico FROM medico WHERE ID_Usuario = ?",
            Role::Patient => "SELECT ID_Paciente FROM paciente WHERE ID_Usuario = ?",
            Role::Administrator => "SELECT ID_Admin FROM administrador WHERE ID_Usuario = ?",
        };
        let row: Option<(i64,)> = sqlx::query_as(sql)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .map_err(db_error)?;
        Ok(row.map(|r| r.0))
    }

    async fn appointment_participants(
        &self,
        appointment_id: i64,
    ) -> Result<Option<AppointmentParticipants>, ApiError> {
        let row: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.ID_Usuario, m.ID_Usuario
            FROM cita c
            JOIN paciente p ON p.ID_Paciente = c.ID_Paciente
            JOIN medico m ON m.ID_Medico = c.ID_Medico
            WHERE c.ID_Cita = ?
            "#,
        )
        .bind(appointment_id)
        .fetch_optional(&self.db)
        .await
        .map_err(db_error)?;

        Ok(row.map(|(patient_user_id, doctor_user_id)| AppointmentParticipants {
            patient_user_id,
            doctor_user_id,
        }))
    }
}
