//! Typed access to the identity kept in session storage.

use shared::domain::User;
use storage::{SessionStorage, USER_KEY};

use crate::error::ClientError;

pub async fn load_user(storage: &dyn SessionStorage) -> Result<Option<User>, ClientError> {
    let raw = storage
        .get(USER_KEY)
        .await
        .map_err(|source| ClientError::Storage { source })?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(|source| ClientError::CorruptSession { source }))
        .transpose()
}

pub async fn persist_user(storage: &dyn SessionStorage, user: &User) -> Result<(), ClientError> {
    let raw =
        serde_json::to_string(user).map_err(|source| ClientError::CorruptSession { source })?;
    storage
        .set(USER_KEY, &raw)
        .await
        .map_err(|source| ClientError::Storage { source })
}

pub async fn clear_user(storage: &dyn SessionStorage) -> Result<(), ClientError> {
    storage
        .remove(USER_KEY)
        .await
        .map_err(|source| ClientError::Storage { source })
}
