//! # Admin dashboard
//!
//! Everything an editor or administrator can change, behind one access
//! gate: a [`ContentManager`] per content type, the two singleton pages,
//! and (administrators only) comment moderation and role assignment.

use std::sync::Arc;

use domains::{
    AccessLevel, Allowlist, Comment, DataClient, DataError, FetchOptions, PageSlug, Record, Role,
    SessionUser, UserRole,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::content_types::{self, ContentKind};
use crate::fetch::decode;
use crate::list_manager::ListManager;
use crate::manager::{Backends, ContentManager};
use crate::page_manager::PageManager;
use crate::schema::SchemaError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DashboardError {
    #[error("sign in to manage the site")]
    SignedOut,

    #[error("this account may not manage the site")]
    NotAnEditor,

    #[error("only administrators may do this")]
    AdminOnly,

    #[error("could not check account role: {0}")]
    RoleLookup(#[source] DataError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Stored role of `user_id`, if any.
pub async fn stored_role(client: &dyn DataClient, user_id: &str) -> Result<Option<Role>, DataError> {
    let options = FetchOptions::matching("user_id", user_id).with_limit(1);
    let Some(row) = client.select(UserRole::TABLE, &options).await?.into_iter().next() else {
        return Ok(None);
    };
    match decode::<UserRole>(UserRole::TABLE, row) {
        Ok(entry) => Ok(Some(entry.role)),
        Err(e) => {
            warn!(user = user_id, error = %e, "ignoring malformed role row");
            Ok(None)
        }
    }
}

/// Access level of the signed-in user. Allowlisted identities never touch
/// the role table.
pub async fn resolve_access(
    client: &dyn DataClient,
    allowlist: &Allowlist,
    user: Option<&SessionUser>,
) -> Result<AccessLevel, DataError> {
    let Some(user) = user else {
        return Ok(AccessLevel::Visitor);
    };
    if allowlist.contains(&user.id) {
        return Ok(AccessLevel::Admin);
    }
    let role = stored_role(client, &user.id).await?;
    Ok(AccessLevel::resolve(allowlist, Some(user), role))
}

pub struct AdminDashboard {
    access: AccessLevel,
    user: SessionUser,
    posts: ContentManager,
    gallery: ContentManager,
    events: ContentManager,
    teachings: ContentManager,
    about: PageManager,
    contact: PageManager,
    comments: Option<ListManager<Comment>>,
    roles: Option<ListManager<UserRole>>,
}

impl AdminDashboard {
    /// Opens the dashboard for `user`, or refuses if they are not at least
    /// an editor.
    pub async fn open(
        backends: Backends,
        allowlist: &Allowlist,
        user: Option<&SessionUser>,
    ) -> Result<Self, DashboardError> {
        let access = resolve_access(backends.client.as_ref(), allowlist, user)
            .await
            .map_err(DashboardError::RoleLookup)?;
        let user = match user {
            Some(user) if access.can_edit_content() => user.clone(),
            Some(user) => {
                warn!(user = %user.id, ?access, "dashboard refused");
                return Err(DashboardError::NotAnEditor);
            }
            None => return Err(DashboardError::SignedOut),
        };
        Self::with_access(backends, user, access)
    }

    fn with_access(backends: Backends, user: SessionUser, access: AccessLevel) -> Result<Self, DashboardError> {
        let manager = |kind: ContentKind| -> Result<ContentManager, SchemaError> {
            Ok(ContentManager::new(Arc::new(kind.schema()?), backends.clone()))
        };
        let posts = manager(ContentKind::Posts)?;
        let gallery = manager(ContentKind::Gallery)?;
        let events = manager(ContentKind::Events)?;
        let teachings = manager(ContentKind::Teachings)?;
        let client = Arc::clone(&backends.client);
        let about = PageManager::new(
            PageSlug::About,
            Arc::new(content_types::about_page()?),
            Arc::clone(&client),
        );
        let contact = PageManager::new(
            PageSlug::Contact,
            Arc::new(content_types::contact_page()?),
            Arc::clone(&client),
        );
        let (comments, roles) = if access.can_moderate() {
            (
                Some(ListManager::comments(Arc::clone(&client))),
                Some(ListManager::roles(client)),
            )
        } else {
            (None, None)
        };

        info!(user = %user.id, ?access, "dashboard opened");
        Ok(Self {
            access,
            user,
            posts,
            gallery,
            events,
            teachings,
            about,
            contact,
            comments,
            roles,
        })
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub fn user(&self) -> &SessionUser {
        &self.user
    }

    pub fn manager(&self, kind: ContentKind) -> &ContentManager {
        match kind {
            ContentKind::Posts => &self.posts,
            ContentKind::Gallery => &self.gallery,
            ContentKind::Events => &self.events,
            ContentKind::Teachings => &self.teachings,
        }
    }

    pub fn manager_mut(&mut self, kind: ContentKind) -> &mut ContentManager {
        match kind {
            ContentKind::Posts => &mut self.posts,
            ContentKind::Gallery => &mut self.gallery,
            ContentKind::Events => &mut self.events,
            ContentKind::Teachings => &mut self.teachings,
        }
    }

    pub fn page(&self, slug: PageSlug) -> &PageManager {
        match slug {
            PageSlug::About => &self.about,
            PageSlug::Contact => &self.contact,
        }
    }

    pub fn page_mut(&mut self, slug: PageSlug) -> &mut PageManager {
        match slug {
            PageSlug::About => &mut self.about,
            PageSlug::Contact => &mut self.contact,
        }
    }

    pub fn comments(&self) -> Result<&ListManager<Comment>, DashboardError> {
        self.comments.as_ref().ok_or(DashboardError::AdminOnly)
    }

    pub fn roles(&self) -> Result<&ListManager<UserRole>, DashboardError> {
        self.roles.as_ref().ok_or(DashboardError::AdminOnly)
    }
}
