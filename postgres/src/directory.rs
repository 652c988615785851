//! User lookups backed by the `users` table.

use async_trait::async_trait;
use slotbook_core::directory::{User, UserDirectory};
use slotbook_core::store::StoreError;
use slotbook_core::types::UserId;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Read-only user directory over a connection pool.
///
/// Runs outside any unit of work: user existence is checked before a
/// booking transaction opens, and users are never written by this engine.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Creates a directory over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        row.map(|row| {
            let id: Uuid = row
                .try_get("id")
                .map_err(|err| StoreError::Backend(err.to_string()))?;
            Ok(User {
                id: UserId::from_uuid(id),
                username: row
                    .try_get("username")
                    .map_err(|err| StoreError::Backend(err.to_string()))?,
                email: row
                    .try_get("email")
                    .map_err(|err| StoreError::Backend(err.to_string()))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|err| StoreError::Backend(err.to_string()))?,
            })
        })
        .transpose()
    }
}
