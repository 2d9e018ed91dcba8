// src/routes/dictionary_routes.rs

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};

use crate::{
    authz::{Operation, Principal, admit, authorize},
    error::ApiError,
    middleware::{json_body::JsonBody, params::{PathParam, QueryParam}},
    models::{ApiOk, AppState, OkData},
    procedures::{Procedure, ProcedureCall},
    routes::{max_len, optional_text, required_text},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_terms).post(create_term))
        .route("/search", get(search_terms))
        .route("/{term_id}", get(get_term).put(update_term).delete(delete_term))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TermDto {
    #[serde(rename(deserialize = "id_diccionario"))]
    pub term_id: i64,
    #[serde(rename(deserialize = "termino"))]
    pub term: String,
    #[serde(rename(deserialize = "definicion"))]
    pub definition: String,
    #[serde(rename(deserialize = "causas"), default)]
    pub causes: Option<String>,
    #[serde(rename(deserialize = "tratamientos"), default)]
    pub treatments: Option<String>,
    #[serde(rename(deserialize = "fecha_actualizacion"), default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TermRequest {
    /// Administrator recorded as author of the change.
    pub admin_user_id: i64,
    pub term: String,
    pub definition: String,
    pub causes: Option<String>,
    pub treatments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActorQuery {
    pub admin_user_id: Option<i64>,
}

fn term_not_found() -> ApiError {
    ApiError::NotFound("TERM_NOT_FOUND", "dictionary term does not exist".into())
}

struct CleanTerm {
    term: String,
    definition: String,
    causes: Option<String>,
    treatments: Option<String>,
}

fn clean(req: TermRequest) -> Result<CleanTerm, ApiError> {
    let term = required_text("term", &req.term)?;
    max_len("term", &term, 150)?;
    Ok(CleanTerm {
        term,
        definition: required_text("definition", &req.definition)?,
        causes: optional_text(req.causes),
        treatments: optional_text(req.treatments),
    })
}

async fn read_term(state: &AppState, term_id: i64) -> Result<TermDto, ApiError> {
    state
        .procedures
        .row(ProcedureCall::new(Procedure::DictionaryGet).arg(term_id))
        .await?
        .ok_or_else(term_not_found)
}

/// GET /dictionary
pub async fn list_terms(
    State(state): State<AppState>,
) -> Result<Json<ApiOk<Vec<TermDto>>>, ApiError> {
    admit(Operation::DictionaryList, None)?;
    let terms = state
        .procedures
        .rows(ProcedureCall::new(Procedure::DictionaryList))
        .await?;
    Ok(Json(ApiOk::new(terms)))
}

/// GET /dictionary/search?q=
/// An empty query lists everything.
pub async fn search_terms(
    State(state): State<AppState>,
    QueryParam(q): QueryParam<SearchQuery>,
) -> Result<Json<ApiOk<Vec<TermDto>>>, ApiError> {
    admit(Operation::DictionarySearch, None)?;
    let call = match optional_text(q.q) {
        Some(needle) => ProcedureCall::new(Procedure::DictionarySearch).arg(needle),
        None => ProcedureCall::new(Procedure::DictionaryList),
    };
    let terms = state.procedures.rows(call).await?;
    Ok(Json(ApiOk::new(terms)))
}

/// GET /dictionary/{term_id}
pub async fn get_term(
    State(state): State<AppState>,
    PathParam(term_id): PathParam<i64>,
) -> Result<Json<ApiOk<TermDto>>, ApiError> {
    admit(Operation::DictionaryGet, None)?;
    Ok(Json(ApiOk::new(read_term(&state, term_id).await?)))
}

/// POST /dictionary
pub async fn create_term(
    State(state): State<AppState>,
    principal: Principal,
    JsonBody(req): JsonBody<TermRequest>,
) -> Result<(StatusCode, Json<ApiOk<TermDto>>), ApiError> {
    let admin_user_id = req.admin_user_id;
    authorize(&state, Operation::DictionaryCreate, &principal, Some(admin_user_id)).await?;
    let t = clean(req)?;

    let term_id = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DictionaryCreate)
                .arg(admin_user_id)
                .arg(t.term)
                .arg(t.definition)
                .arg(t.causes)
                .arg(t.treatments),
        )
        .await?;

    tracing::info!(term_id, admin_user_id, "dictionary term created");
    Ok((StatusCode::CREATED, Json(ApiOk::new(read_term(&state, term_id).await?))))
}

/// PUT /dictionary/{term_id}
pub async fn update_term(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(term_id): PathParam<i64>,
    JsonBody(req): JsonBody<TermRequest>,
) -> Result<Json<ApiOk<TermDto>>, ApiError> {
    let admin_user_id = req.admin_user_id;
    authorize(&state, Operation::DictionaryUpdate, &principal, Some(admin_user_id)).await?;
    let t = clean(req)?;

    let updated = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DictionaryUpdate)
                .arg(admin_user_id)
                .arg(term_id)
                .arg(t.term)
                .arg(t.definition)
                .arg(t.causes)
                .arg(t.treatments),
        )
        .await?;

    if updated == 0 {
        return Err(term_not_found());
    }
    Ok(Json(ApiOk::new(read_term(&state, term_id).await?)))
}

/// DELETE /dictionary/{term_id}?admin_user_id=
pub async fn delete_term(
    State(state): State<AppState>,
    principal: Principal,
    PathParam(term_id): PathParam<i64>,
    QueryParam(q): QueryParam<ActorQuery>,
) -> Result<Json<ApiOk<OkData>>, ApiError> {
    let admin_user_id = q
        .admin_user_id
        .ok_or_else(|| ApiError::validation("admin_user_id is required"))?;
    authorize(&state, Operation::DictionaryDelete, &principal, Some(admin_user_id)).await?;

    let deleted = state
        .procedures
        .scalar_i64(
            ProcedureCall::new(Procedure::DictionaryDelete)
                .arg(admin_user_id)
                .arg(term_id),
        )
        .await?;

    if deleted == 0 {
        return Err(term_not_found());
    }
    tracing::info!(term_id, admin_user_id, "dictionary term deleted");
    Ok(Json(ApiOk::new(OkData::with_message("dictionary term deleted"))))
}
