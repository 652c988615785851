//! In-memory user directory.

use async_trait::async_trait;
use slotbook_core::directory::{User, UserDirectory};
use slotbook_core::store::StoreError;
use slotbook_core::types::UserId;
use std::collections::HashMap;
use std::sync::Mutex;

/// A mutex-guarded user table.
///
/// Lookups clone the stored record, so holders of a [`User`] never observe
/// later mutations of the table.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<UserId, User>>,
}

impl MemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user, replacing any existing record with the same id.
    pub fn insert(&self, user: User) {
        self.lock().insert(user.id, user);
    }

    /// Seeds the directory from an iterator of users.
    pub fn seed(&self, users: impl IntoIterator<Item = User>) {
        let mut table = self.lock();
        for user in users {
            table.insert(user.id, user);
        }
    }

    #[allow(clippy::expect_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, User>> {
        // A poisoned lock means a writer panicked mid-update; propagating
        // the panic is the only sound option.
        self.users.lock().expect("user table lock poisoned")
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(name: &str) -> User {
        User {
            id: UserId::new(),
            username: name.to_owned(),
            email: format!("{name}@example.com"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn lookup_finds_seeded_users() {
        let directory = MemoryUserDirectory::new();
        let alice = user("alice");
        directory.seed([alice.clone(), user("bob")]);

        let found = directory.find_user(alice.id).await.unwrap();
        assert_eq!(found, Some(alice));

        let missing = directory.find_user(UserId::new()).await.unwrap();
        assert_eq!(missing, None);
    }
}
