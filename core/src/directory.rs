//! User lookup collaborator.
//!
//! The engine only needs to know whether a user exists before creating a
//! reservation on their behalf; account management, credentials, and roles
//! live in the embedding application. The trait is object-safe so the
//! orchestrator can hold it as `Arc<dyn UserDirectory>`.

use crate::store::StoreError;
use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user known to the directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// User identity.
    pub id: UserId,
    /// Login name.
    pub username: String,
    /// Contact address.
    pub email: String,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for User {}

/// Read-only lookup of users by id.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up a user by id; `Ok(None)` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the backend fails.
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}
