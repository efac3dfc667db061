//! Per-request identity from the `Authorization: Bearer` header.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domains::{RawSession, SessionUser};
use services::project_session;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// The caller's session, if a bearer token was sent. A token that does not
/// resolve is rejected with 401 rather than treated as signed out.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub raw: Option<RawSession>,
    pub user: Option<SessionUser>,
}

impl CurrentUser {
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }
}

fn bearer(parts: &Parts) -> Result<Option<&str>, ApiError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed authorization header".into()))?;
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err(ApiError::Unauthorized("expected a bearer token".into())),
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer(parts)? else {
            return Ok(Self::default());
        };
        let raw = state.resolver.resolve(token).await.map_err(|e| {
            warn!(error = %e, "bearer token refused");
            ApiError::Unauthorized(e.to_string())
        })?;
        debug!(user = %raw.user_id, "request authenticated");
        let user = project_session(&raw);
        Ok(Self {
            raw: Some(raw),
            user: Some(user),
        })
    }
}
