//! gRPC services over a [`BoardStore`]. Every successful write is published
//! to the change hub.

pub mod boards;
pub mod columns;
pub mod health;
pub mod realtime;
pub mod tasks;

use std::sync::Arc;

use tonic::Request;

use crate::error::{KanbanError, Result};
use crate::store::{BoardStore, RowOwner, RowRef};

pub use boards::BoardsController;
pub use columns::ColumnsController;
pub use health::HealthController;
pub use realtime::RealtimeController;
pub use tasks::TasksController;

pub type SharedStore = Arc<dyn BoardStore>;

/// Metadata key carrying the caller's user id, set by the auth gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn user_id<T>(request: &Request<T>) -> Result<String> {
    request
        .metadata()
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or(KanbanError::Unauthenticated)
}

/// Looks up the row's board and checks that `user_id` owns it.
pub async fn authorize(store: &dyn BoardStore, user_id: &str, row: RowRef) -> Result<RowOwner> {
    let owner = store
        .locate(row.clone())
        .await?
        .ok_or_else(|| KanbanError::not_found(row.resource(), row.id()))?;

    if owner.user_id != user_id {
        return Err(KanbanError::PermissionDenied {
            resource: row.resource(),
            id: row.id().to_string(),
        });
    }
    Ok(owner)
}

pub(crate) fn required_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(KanbanError::invalid_argument("title must not be empty"));
    }
    Ok(title.to_string())
}

#[cfg(test)]
pub(crate) fn signed<T>(message: T, user_id: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert(USER_ID_HEADER, user_id.parse().unwrap());
    request
}
