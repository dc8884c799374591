//! In-memory user storage, used when no database is configured.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::ServerError;
use crate::error::Result;
use crate::user::{NewUser, USER_EXISTS, USERNAME_TAKEN, User, UserId, UserRepository};

/// In-memory implementation of [`UserRepository`].
///
/// Users keep their insertion order. Username uniqueness is checked under
/// the write lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<Vec<User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_all(&self) -> Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| &u.id == id).cloned())
    }

    async fn create(&self, user: NewUser) -> Result<Option<User>> {
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.username == user.username) {
            return Err(ServerError::Conflict(USER_EXISTS.into()));
        }

        let user = User {
            id: UserId::from(uuid::Uuid::new_v4().to_string()),
            username: user.username,
            password: user.password,
            roles: user.roles,
            active: user.active,
        };
        users.push(user.clone());

        tracing::debug!(user_id = %user.id, "user stored in memory");
        Ok(Some(user))
    }

    async fn save(&self, user: &User) -> Result<Option<User>> {
        let mut users = self.users.write().await;

        if users
            .iter()
            .any(|u| u.id != user.id && u.username == user.username)
        {
            return Err(ServerError::Conflict(USERNAME_TAKEN.into()));
        }

        match users.iter_mut().find(|u| u.id == user.id) {
            Some(stored) => {
                *stored = user.clone();
                Ok(Some(user.clone()))
            },
            None => Ok(None),
        }
    }

    async fn delete(&self, user: &User) -> Result<bool> {
        let mut users = self.users.write().await;
        let before = users.len();
        users.retain(|u| u.id != user.id);

        Ok(users.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Password, PasswordHasher, test_hasher};
    use crate::user::Roles;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: test_hasher().hash(&Password::new("p@ss").unwrap()).unwrap(),
            roles: Roles::parse(vec!["Employee".into()]).unwrap(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_keeps_order() {
        let repo = InMemoryUserRepository::new();

        let alice = repo.create(new_user("alice")).await.unwrap().unwrap();
        let bob = repo.create(new_user("bob")).await.unwrap().unwrap();
        assert_ne!(alice.id, bob.id);

        let names: Vec<_> = repo
            .find_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, ["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_username_is_unique() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice")).await.unwrap();

        let result = repo.create(new_user("alice")).await;
        assert!(matches!(result, Err(ServerError::Conflict(_))));

        let mut bob = repo.create(new_user("bob")).await.unwrap().unwrap();
        bob.username = "alice".into();
        assert!(matches!(repo.save(&bob).await, Err(ServerError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_username_is_case_sensitive() {
        let repo = InMemoryUserRepository::new();
        repo.create(new_user("alice")).await.unwrap();

        assert!(repo.find_by_username("Alice").await.unwrap().is_none());
        assert!(repo.create(new_user("Alice")).await.is_ok());
    }

    #[tokio::test]
    async fn test_save_and_delete_unknown_user() {
        let repo = InMemoryUserRepository::new();
        let mut ghost = repo.create(new_user("ghost")).await.unwrap().unwrap();
        assert!(repo.delete(&ghost).await.unwrap());

        ghost.active = false;
        assert!(repo.save(&ghost).await.unwrap().is_none());
        assert!(!repo.delete(&ghost).await.unwrap());
    }
}
