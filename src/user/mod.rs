mod memory;
mod repository;
mod service;

pub use memory::*;
pub use repository::*;
pub use service::*;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ServerError;
use crate::crypto::PasswordHash;
use crate::error::Result;

pub const FIELDS_REQUIRED: &str = "All fields are required";
pub const ID_REQUIRED: &str = "User ID required";
pub const NO_USERS: &str = "No users found";
pub const USER_EXISTS: &str = "User already exists";
pub const USER_MISSING: &str = "User does not exist";
pub const USERNAME_TAKEN: &str = "Username already taken";
pub const HAS_NOTES: &str = "User has notes, cannot delete";

/// Opaque identifier assigned by storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Returns the same string as a string slice `&str`.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-empty, ordered role labels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Roles(Vec<String>);

impl Roles {
    /// Converts a list of labels into [`Roles`].
    ///
    /// # Errors
    ///
    /// Returns `Err` if the list is empty.
    pub fn parse(roles: Vec<String>) -> Result<Self> {
        if roles.is_empty() {
            return Err(ServerError::InvalidInput(FIELDS_REQUIRED.into()));
        }

        Ok(Self(roles))
    }

    #[inline]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// User as saved on storage.
#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub password: PasswordHash,
    pub roles: Roles,
    pub active: bool,
}

/// Fields of a [`User`] not yet stored.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password: PasswordHash,
    pub roles: Roles,
    pub active: bool,
}

/// Public view of a [`User`], without password.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub username: String,
    pub roles: Vec<String>,
    pub active: bool,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id.0,
            username: user.username,
            roles: user.roles.into_inner(),
            active: user.active,
        }
    }
}

/// Body of a user creation.
#[derive(Default, Serialize, Deserialize, Validate)]
pub struct CreateUserRequest {
    pub username: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<String>>,
}

/// Body of a user update.
#[derive(Default, Serialize, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub id: Option<String>,
    pub username: Option<String>,
    pub roles: Option<Vec<String>>,
    pub active: Option<bool>,
    pub password: Option<String>,
}

/// Body of a user deletion.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct DeleteUserRequest {
    pub id: Option<String>,
}

/// Keep `Some` only for non-empty strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_must_not_be_empty() {
        assert!(matches!(
            Roles::parse(Vec::new()),
            Err(ServerError::InvalidInput(_))
        ));

        let roles = Roles::parse(vec!["Employee".into(), "Admin".into()]).unwrap();
        assert_eq!(roles.as_slice(), ["Employee", "Admin"]);
    }

    #[test]
    fn test_summary_serialization_has_no_password() {
        let summary = UserSummary {
            id: "1".into(),
            username: "alice".into(),
            roles: vec!["Employee".into()],
            active: true,
        };

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["_id"], "1");
        assert!(json.get("password").is_none());
    }

    #[test]
    fn test_update_body_rejects_non_boolean_active() {
        let body = r#"{"id":"1","username":"a","roles":["x"],"active":"yes"}"#;
        assert!(serde_json::from_str::<UpdateUserRequest>(body).is_err());
    }
}
