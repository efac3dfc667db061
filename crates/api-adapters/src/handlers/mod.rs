pub mod admin;
pub mod public;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::Language;
use serde::{Deserialize, Serialize};
use services::{PageView, Section};

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    pub lang: Option<String>,
}

impl LangQuery {
    /// `?lang=` defaults to English; anything but `en`/`km` is a 400.
    pub fn language(&self) -> Result<Language, ApiError> {
        match self.lang.as_deref() {
            None | Some("") => Ok(Language::default()),
            Some(s) => s.parse().map_err(ApiError::BadRequest),
        }
    }
}

/// A page view with the status its section implies: missing documents are
/// 404 and failed loads 502, both still carrying the page body.
pub fn page<T: Serialize>(view: PageView<T>) -> Response {
    let status = match &view.section {
        Section::NotFound { .. } => StatusCode::NOT_FOUND,
        Section::Failed { .. } => StatusCode::BAD_GATEWAY,
        Section::Ready(_) | Section::Loading => StatusCode::OK,
    };
    (status, Json(view)).into_response()
}

pub async fn healthz() -> &'static str {
    "ok"
}
