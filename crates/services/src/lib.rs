//! # services
//!
//! Application core of the temple site: fetchers, the schema-driven content
//! manager and its variants, the admin dashboard, search, the session
//! watcher and the public page view models. Talks to the outside world only
//! through the ports in `domains`.

pub mod content_types;
pub mod dashboard;
pub mod fetch;
pub mod list_manager;
pub mod manager;
pub mod page_manager;
pub mod pages;
pub mod schema;
pub mod search;
pub mod session;

pub use content_types::ContentKind;
pub use dashboard::{resolve_access, AdminDashboard, DashboardError};
pub use fetch::{CollectionFetcher, DocumentFetcher, FetchError, FetchState};
pub use list_manager::ListManager;
pub use manager::{
    Backends, Confirmation, ContentManager, DeleteOutcome, ManagerError, SubmitOutcome, UploadError,
    UploadFile,
};
pub use page_manager::PageManager;
pub use pages::{CommentError, PageView, Section, Site};
pub use schema::{ContentSchema, FieldKind, FieldSpec, FieldValue, FormError, FormState, SchemaError};
pub use search::{search, SearchHit, SearchOutcome, SearchPage, SearchSources};
pub use session::{derive_session, project_session, AppSession, AppShell, SessionWatcher};
