//! List-only admin views: comment moderation and role assignment. No form
//! machinery, just the list, delete and (for roles) upsert by identity.

use std::sync::Arc;

use domains::{Comment, DataClient, FetchOptions, OrderBy, Record, Role, Row, UserRole};
use tracing::{error, info, warn};

use crate::fetch::{CollectionFetcher, FetchState};
use crate::manager::{Confirmation, DeleteOutcome, ManagerError};

pub struct ListManager<T> {
    client: Arc<dyn DataClient>,
    list: CollectionFetcher<T>,
    /// Column deletes are keyed on.
    key_column: &'static str,
}

impl<T: Record> ListManager<T> {
    fn new(client: Arc<dyn DataClient>, order_by: OrderBy, key_column: &'static str) -> Self {
        let list = CollectionFetcher::new(Arc::clone(&client), T::TABLE, FetchOptions::ordered(order_by));
        Self {
            client,
            list,
            key_column,
        }
    }

    pub fn items(&self) -> FetchState<Vec<T>> {
        self.list.state()
    }

    pub async fn refresh(&self) -> FetchState<Vec<T>> {
        self.list.refetch().await
    }

    pub async fn delete(
        &self,
        key: &str,
        confirmation: &dyn Confirmation,
    ) -> Result<DeleteOutcome, ManagerError> {
        if !confirmation.confirm(&format!("Delete {key} from {}?", T::TABLE)) {
            warn!(table = T::TABLE, key, "delete cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }
        self.client
            .delete(T::TABLE, self.key_column, key)
            .await
            .map_err(|source| {
                error!(table = T::TABLE, key, error = %source, "delete failed");
                ManagerError::Delete {
                    table: T::TABLE.to_string(),
                    source,
                }
            })?;
        info!(table = T::TABLE, key, "row deleted");
        Ok(DeleteOutcome::Deleted)
    }
}

impl ListManager<Comment> {
    /// Newest comments first.
    pub fn comments(client: Arc<dyn DataClient>) -> Self {
        Self::new(client, OrderBy::desc("createdAt"), "id")
    }
}

impl ListManager<UserRole> {
    pub fn roles(client: Arc<dyn DataClient>) -> Self {
        Self::new(client, OrderBy::asc("user_id"), "user_id")
    }

    /// Grants `role`, replacing whatever the identity had before.
    pub async fn assign(&self, user_id: &str, role: Role) -> Result<(), ManagerError> {
        let record = UserRole {
            user_id: user_id.to_string(),
            role,
        };
        let row = match serde_json::to_value(&record) {
            Ok(serde_json::Value::Object(row)) => row,
            _ => Row::new(),
        };
        self.client
            .upsert(UserRole::TABLE, "user_id", row)
            .await
            .map_err(|source| {
                error!(user_id, error = %source, "role assignment failed");
                ManagerError::Write {
                    table: UserRole::TABLE.to_string(),
                    source,
                }
            })?;
        info!(user_id, ?role, "role assigned");
        Ok(())
    }
}
