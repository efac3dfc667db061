//! # api-adapters
//!
//! JSON-over-HTTP facade for the temple site. Public pages are open to
//! everyone; `/api/admin` routes open an admin dashboard for the bearer of
//! the request and let it decide what is allowed.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

pub use auth::CurrentUser;
pub use error::ApiError;
pub use state::AppState;

use handlers::{admin, healthz, public};

/// Ceiling for a multipart upload request.
pub const UPLOAD_LIMIT_BYTES: usize = 25 * 1024 * 1024;

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/session", get(public::session))
        .route("/feed", get(public::feed))
        .route("/gallery", get(public::gallery))
        .route("/gallery/{id}", get(public::album))
        .route("/events", get(public::events))
        .route("/events/{id}", get(public::event))
        .route("/teachings", get(public::teachings))
        .route("/teachings/{id}", get(public::teaching))
        .route("/about", get(public::about))
        .route("/contact", get(public::contact))
        .route("/comments", get(public::comments).post(public::post_comment))
        .route("/search", get(public::search))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/pages/{slug}", get(admin::page_form).put(admin::save_page))
        .route("/comments", get(admin::comments))
        .route("/comments/{id}", delete(admin::remove_comment))
        .route("/roles", get(admin::roles))
        .route("/roles/{user_id}", put(admin::assign_role).delete(admin::revoke_role))
        .route("/{kind}", get(admin::list).post(admin::create))
        .route(
            "/{kind}/{id}",
            get(admin::edit_form).put(admin::update).delete(admin::remove),
        )
        .route(
            "/{kind}/uploads/{field}",
            post(admin::upload).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
}

/// The full application router, state applied. The caller adds
/// [`middleware::standard_layers`] and any static file mounts.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", public_routes().nest("/admin", admin_routes()))
        .with_state(state)
}
