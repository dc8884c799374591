use std::sync::Arc;

use crate::ServerError;
use crate::crypto::{Password, PasswordHasher};
use crate::error::Result;
use crate::note::NoteRepository;
use crate::user::{
    CreateUserRequest, DeleteUserRequest, FIELDS_REQUIRED, HAS_NOTES,
    ID_REQUIRED, NO_USERS, NewUser, Roles, USER_EXISTS, USER_MISSING,
    USERNAME_TAKEN, UpdateUserRequest, UserId, UserRepository, UserSummary,
    non_empty,
};

/// Users created without an explicit flag are active.
pub const DEFAULT_ACTIVE: bool = true;

/// Users resource manager.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    notes: Arc<dyn NoteRepository>,
    hasher: Arc<dyn PasswordHasher>,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(
        users: Arc<dyn UserRepository>,
        notes: Arc<dyn NoteRepository>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Self {
        Self {
            users,
            notes,
            hasher,
        }
    }

    /// List every user, without passwords.
    pub async fn list(&self) -> Result<Vec<UserSummary>> {
        let users = self.users.find_all().await?;
        if users.is_empty() {
            return Err(ServerError::NotFound(NO_USERS.into()));
        }

        Ok(users.into_iter().map(UserSummary::from).collect())
    }

    /// Create a user and hash its password.
    pub async fn create(&self, request: CreateUserRequest) -> Result<String> {
        let (Some(username), Some(password), Some(roles)) = (
            non_empty(request.username),
            non_empty(request.password),
            request.roles,
        ) else {
            return Err(ServerError::InvalidInput(FIELDS_REQUIRED.into()));
        };
        let roles = Roles::parse(roles)?;
        let password = Password::new(password)?;

        if self.users.find_by_username(&username).await?.is_some() {
            tracing::debug!(%username, "username already exists");
            return Err(ServerError::Conflict(USER_EXISTS.into()));
        }

        let user = NewUser {
            username,
            password: self.hasher.hash(&password)?,
            roles,
            active: DEFAULT_ACTIVE,
        };

        let Some(user) = self.users.create(user).await? else {
            return Err(ServerError::Persistence(
                "User could not be created".into(),
            ));
        };

        tracing::info!(user_id = %user.id, username = %user.username, "user created");
        Ok(format!("New user {} created", user.username))
    }

    /// Replace username, roles and `active` flag; re-hash the password only
    /// when a new one is given.
    pub async fn update(&self, request: UpdateUserRequest) -> Result<String> {
        let (Some(id), Some(username), Some(roles), Some(active)) = (
            non_empty(request.id),
            non_empty(request.username),
            request.roles,
            request.active,
        ) else {
            return Err(ServerError::InvalidInput(FIELDS_REQUIRED.into()));
        };
        let roles = Roles::parse(roles)?;
        let password = non_empty(request.password).map(Password::new).transpose()?;

        let id = UserId::from(id);
        let Some(mut user) = self.users.find_by_id(&id).await? else {
            return Err(ServerError::NotFound(USER_MISSING.into()));
        };

        let duplicate = self.users.find_by_username(&username).await?;
        if duplicate.is_some_and(|other| other.id != user.id) {
            tracing::debug!(user_id = %id, %username, "username already taken");
            return Err(ServerError::Conflict(USERNAME_TAKEN.into()));
        }

        user.username = username;
        user.roles = roles;
        user.active = active;
        if let Some(password) = password {
            user.password = self.hasher.hash(&password)?;
        }

        let Some(user) = self.users.save(&user).await? else {
            return Err(ServerError::Persistence(
                "User could not be updated".into(),
            ));
        };

        tracing::info!(user_id = %user.id, username = %user.username, "user updated");
        Ok(format!("User {} updated", user.username))
    }

    /// Delete a user who owns no note.
    pub async fn delete(&self, request: DeleteUserRequest) -> Result<String> {
        let Some(id) = non_empty(request.id) else {
            return Err(ServerError::InvalidInput(ID_REQUIRED.into()));
        };

        let id = UserId::from(id);
        let Some(user) = self.users.find_by_id(&id).await? else {
            return Err(ServerError::NotFound(USER_MISSING.into()));
        };

        if !self.notes.find_by_user(&user.id).await?.is_empty() {
            tracing::warn!(user_id = %user.id, "refusing to delete user owning notes");
            return Err(ServerError::Conflict(HAS_NOTES.into()));
        }

        if !self.users.delete(&user).await? {
            return Err(ServerError::Persistence(
                "User could not be deleted".into(),
            ));
        }

        tracing::info!(user_id = %user.id, username = %user.username, "user deleted");
        Ok(format!("User {} deleted", user.username))
    }
}
