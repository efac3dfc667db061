use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domains::DataError;
use serde_json::json;
use services::{CommentError, DashboardError, FetchError, FormError, ManagerError, UploadError};
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Invalid(String),

    #[error("deleting requires ?confirm=true")]
    ConfirmationRequired,

    #[error("{0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::ConfirmationRequired => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(%status, error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<DataError> for ApiError {
    fn from(e: DataError) -> Self {
        if e.is_not_found() {
            ApiError::NotFound(e.to_string())
        } else {
            ApiError::Upstream(e.to_string())
        }
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::NotFound | FetchError::MissingId => ApiError::NotFound(e.to_string()),
            FetchError::Collection { .. } | FetchError::Document { .. } => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        match e {
            DashboardError::SignedOut => ApiError::Unauthorized(e.to_string()),
            DashboardError::NotAnEditor | DashboardError::AdminOnly => ApiError::Forbidden(e.to_string()),
            DashboardError::RoleLookup(_) => ApiError::Upstream(e.to_string()),
            DashboardError::Schema(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<UploadError> for ApiError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::NotAnImageField(_) => ApiError::NotFound(e.to_string()),
            UploadError::NoFiles => ApiError::BadRequest(e.to_string()),
            UploadError::Failed { .. } => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

impl From<ManagerError> for ApiError {
    fn from(e: ManagerError) -> Self {
        match e {
            ManagerError::Form(_) => ApiError::Invalid(e.to_string()),
            ManagerError::Upload(upload) => upload.into(),
            ManagerError::Write { ref source, .. } | ManagerError::Delete { ref source, .. }
                if source.is_not_found() =>
            {
                ApiError::NotFound(e.to_string())
            }
            ManagerError::Write { .. } | ManagerError::Delete { .. } => ApiError::Upstream(e.to_string()),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(e: CommentError) -> Self {
        match e {
            CommentError::SignInRequired => ApiError::Unauthorized(e.to_string()),
            CommentError::Empty | CommentError::TooLong { .. } => ApiError::Invalid(e.to_string()),
            CommentError::Write(_) => ApiError::Upstream(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_statuses() {
        let refused: ApiError = DashboardError::NotAnEditor.into();
        assert_eq!(refused.status(), StatusCode::FORBIDDEN);

        let missing: ApiError = ManagerError::Write {
            table: "events".into(),
            source: DataError::not_found("events", "e9"),
        }
        .into();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad_form: ApiError = ManagerError::Form(FormError::UnknownField("colour".into())).into();
        assert_eq!(bad_form.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let offline: ApiError = DataError::backend("posts", "connection refused").into();
        assert_eq!(offline.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn comment_rules_are_client_errors() {
        assert_eq!(ApiError::from(CommentError::SignInRequired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(CommentError::TooLong { max: 2000 }).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
