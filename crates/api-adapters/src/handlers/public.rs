//! Visitor-facing endpoints. Everything is readable without a session
//! except posting a comment.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::AccessLevel;
use serde::{Deserialize, Serialize};
use services::{derive_session, resolve_access, AppSession};

use super::{page, LangQuery};
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: AppSession,
    pub access: AccessLevel,
}

pub async fn session(State(state): State<AppState>, current: CurrentUser) -> Result<Json<SessionView>, ApiError> {
    let session = derive_session(current.raw.as_ref(), &state.allowlist);
    let access = resolve_access(state.backends.client.as_ref(), &state.allowlist, current.user()).await?;
    Ok(Json(SessionView { session, access }))
}

pub async fn feed(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.feed(q.language()?).await))
}

pub async fn gallery(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.gallery(q.language()?).await))
}

pub async fn album(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Response, ApiError> {
    Ok(page(state.site.album(&id, q.language()?).await))
}

pub async fn events(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.events(q.language()?).await))
}

pub async fn event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Response, ApiError> {
    Ok(page(state.site.event(&id, q.language()?).await))
}

pub async fn teachings(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.teachings(q.language()?).await))
}

pub async fn teaching(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Response, ApiError> {
    Ok(page(state.site.teaching(&id, q.language()?).await))
}

pub async fn about(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.about(q.language()?).await))
}

pub async fn contact(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.contact(q.language()?).await))
}

pub async fn comments(State(state): State<AppState>, Query(q): Query<LangQuery>) -> Result<Response, ApiError> {
    Ok(page(state.site.comments(q.language()?).await))
}

#[derive(Debug, Deserialize)]
pub struct NewComment {
    pub text: String,
}

pub async fn post_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<NewComment>,
) -> Result<Response, ApiError> {
    let comment = state.site.post_comment(current.user(), &body.text).await?;
    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    pub lang: Option<String>,
}

pub async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> Result<Response, ApiError> {
    let lang = LangQuery { lang: query.lang }.language()?;
    Ok(page(state.site.search(&query.q, lang).await))
}
