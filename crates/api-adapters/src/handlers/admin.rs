//! Dashboard endpoints. Each request opens an [`AdminDashboard`] for the
//! caller, which enforces the access gate, and works on a fresh manager.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::{Comment, PageSlug, Role, Row, UserRole};
use serde::{Deserialize, Serialize};
use serde_json::json;
use services::schema::ListItem;
use services::{
    AdminDashboard, ContentKind, DeleteOutcome, FetchState, FieldSpec, FormState, SubmitOutcome, UploadFile,
};
use tracing::debug;

use super::LangQuery;
use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

async fn open(state: &AppState, current: &CurrentUser) -> Result<AdminDashboard, ApiError> {
    Ok(AdminDashboard::open(state.backends.clone(), &state.allowlist, current.user()).await?)
}

fn kind(raw: &str) -> Result<ContentKind, ApiError> {
    raw.parse().map_err(ApiError::NotFound)
}

fn slug(raw: &str) -> Result<PageSlug, ApiError> {
    raw.parse().map_err(ApiError::NotFound)
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmQuery {
    #[serde(default)]
    pub confirm: bool,
}

fn deleted(outcome: DeleteOutcome) -> Result<Response, ApiError> {
    match outcome {
        DeleteOutcome::Deleted => Ok(StatusCode::NO_CONTENT.into_response()),
        DeleteOutcome::Cancelled => Err(ApiError::ConfirmationRequired),
    }
}

#[derive(Debug, Serialize)]
pub struct ContentList {
    pub kind: ContentKind,
    pub fields: Vec<FieldSpec>,
    pub items: Vec<ListItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(raw_kind): Path<String>,
    Query(q): Query<LangQuery>,
) -> Result<Json<ContentList>, ApiError> {
    let kind = kind(&raw_kind)?;
    let lang = q.language()?;
    let dashboard = open(&state, &current).await?;
    let manager = dashboard.manager(kind);
    let fetched = manager.refresh().await;
    Ok(Json(ContentList {
        kind,
        fields: manager.schema().fields().to_vec(),
        items: manager.list_items(lang),
        error: fetched.error.map(|e| e.to_string()),
    }))
}

/// The stored row as an edit form.
pub async fn edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((raw_kind, id)): Path<(String, String)>,
) -> Result<Json<FormState>, ApiError> {
    let kind = kind(&raw_kind)?;
    let mut dashboard = open(&state, &current).await?;
    let row = state.backends.client.select_one(kind.table(), &id).await?;
    let manager = dashboard.manager_mut(kind);
    manager.begin_edit(&row);
    Ok(Json(manager.form().clone()))
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(raw_kind): Path<String>,
    Json(body): Json<Row>,
) -> Result<Response, ApiError> {
    let kind = kind(&raw_kind)?;
    let mut dashboard = open(&state, &current).await?;
    let manager = dashboard.manager_mut(kind);
    manager.fill(&body)?;
    let outcome: SubmitOutcome = manager.submit(current.user()).await?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

/// Loads the stored row, applies the submitted fields over it and writes
/// it back. Fields left out of the body keep their stored values.
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((raw_kind, id)): Path<(String, String)>,
    Json(body): Json<Row>,
) -> Result<Json<SubmitOutcome>, ApiError> {
    let kind = kind(&raw_kind)?;
    let mut dashboard = open(&state, &current).await?;
    let row = state.backends.client.select_one(kind.table(), &id).await?;
    let manager = dashboard.manager_mut(kind);
    manager.begin_edit(&row);
    manager.fill(&body)?;
    Ok(Json(manager.submit(current.user()).await?))
}

pub async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((raw_kind, id)): Path<(String, String)>,
    Query(q): Query<ConfirmQuery>,
) -> Result<Response, ApiError> {
    let kind = kind(&raw_kind)?;
    let dashboard = open(&state, &current).await?;
    let outcome = dashboard
        .manager(kind)
        .delete(&id, &|_: &str| q.confirm)
        .await?;
    deleted(outcome)
}

#[derive(Debug, Serialize)]
pub struct Uploaded {
    pub field: String,
    pub urls: Vec<String>,
}

/// Every multipart part that carries a file name is uploaded into `field`.
pub async fn upload(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((raw_kind, field)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<Uploaded>, ApiError> {
    let kind = kind(&raw_kind)?;
    let mut dashboard = open(&state, &current).await?;

    let mut files = Vec::new();
    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let Some(name) = part.file_name().map(str::to_string) else {
            debug!(part = ?part.name(), "skipping non-file part");
            continue;
        };
        let content_type = part.content_type().map(str::to_string);
        let data = part
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        files.push(UploadFile {
            name,
            data,
            content_type,
        });
    }

    let urls = dashboard.manager_mut(kind).upload_images(&field, files).await?;
    Ok(Json(Uploaded { field, urls }))
}

pub async fn page_form(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(raw_slug): Path<String>,
) -> Result<Json<FormState>, ApiError> {
    let slug = slug(&raw_slug)?;
    let mut dashboard = open(&state, &current).await?;
    let form = dashboard.page_mut(slug).load().await?;
    Ok(Json(form.clone()))
}

pub async fn save_page(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(raw_slug): Path<String>,
    Json(body): Json<Row>,
) -> Result<Json<FormState>, ApiError> {
    let slug = slug(&raw_slug)?;
    let mut dashboard = open(&state, &current).await?;
    let page = dashboard.page_mut(slug);
    page.load().await?;
    page.fill(&body)?;
    page.save().await?;
    Ok(Json(page.form().clone()))
}

pub async fn comments(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<FetchState<Vec<Comment>>>, ApiError> {
    let dashboard = open(&state, &current).await?;
    Ok(Json(dashboard.comments()?.refresh().await))
}

pub async fn remove_comment(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Query(q): Query<ConfirmQuery>,
) -> Result<Response, ApiError> {
    let dashboard = open(&state, &current).await?;
    let outcome = dashboard.comments()?.delete(&id, &|_: &str| q.confirm).await?;
    deleted(outcome)
}

pub async fn roles(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<FetchState<Vec<UserRole>>>, ApiError> {
    let dashboard = open(&state, &current).await?;
    Ok(Json(dashboard.roles()?.refresh().await))
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
    pub role: Role,
}

pub async fn assign_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(body): Json<RoleBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dashboard = open(&state, &current).await?;
    dashboard.roles()?.assign(&user_id, body.role).await?;
    Ok(Json(json!({ "user_id": user_id, "role": body.role })))
}

pub async fn revoke_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Query(q): Query<ConfirmQuery>,
) -> Result<Response, ApiError> {
    let dashboard = open(&state, &current).await?;
    let outcome = dashboard.roles()?.delete(&user_id, &|_: &str| q.confirm).await?;
    deleted(outcome)
}
