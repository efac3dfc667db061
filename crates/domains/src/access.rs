//! # Access
//!
//! The administrator allowlist is configuration, injected at startup. The
//! checks here are pure functions over it.

use std::collections::HashSet;

use serde::Serialize;

use crate::models::{Role, SessionUser};

/// Identities granted administrative capability.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allowlist(HashSet<String>);

impl Allowlist {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            ids.into_iter()
                .map(Into::into)
                .map(|id: String| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Membership test against the allowlist. A signed-out visitor is never an
/// administrator.
pub fn is_admin(allowlist: &Allowlist, current_id: Option<&str>) -> bool {
    current_id.is_some_and(|id| allowlist.contains(id))
}

/// What a request is allowed to do, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    Visitor,
    /// Signed in: may comment.
    Member,
    /// May create, edit and delete site content.
    Editor,
    /// Everything, including comment moderation and role assignment.
    Admin,
}

impl AccessLevel {
    /// Allowlisted identities are administrators regardless of their stored
    /// role; the role table only elevates everybody else.
    pub fn resolve(allowlist: &Allowlist, user: Option<&SessionUser>, role: Option<Role>) -> Self {
        let Some(user) = user else {
            return AccessLevel::Visitor;
        };
        if is_admin(allowlist, Some(&user.id)) {
            return AccessLevel::Admin;
        }
        match role {
            Some(Role::Admin) => AccessLevel::Admin,
            Some(Role::Editor) => AccessLevel::Editor,
            None => AccessLevel::Member,
        }
    }

    pub fn can_edit_content(self) -> bool {
        self >= AccessLevel::Editor
    }

    pub fn can_moderate(self) -> bool {
        self == AccessLevel::Admin
    }
}
