//! Handle database requests.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use crate::ServerError;
use crate::crypto::PasswordHash;
use crate::error::Result;
use crate::user::{
    HAS_NOTES, NewUser, Roles, USER_EXISTS, USERNAME_TAKEN, User, UserId,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Port for user persistence operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Every stored user, in storage order.
    async fn find_all(&self) -> Result<Vec<User>>;

    /// Find a user by exact username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Find a user by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Store a new user; storage assigns its identifier.
    ///
    /// Fails with a conflict when the username is already stored.
    async fn create(&self, user: NewUser) -> Result<Option<User>>;

    /// Overwrite a stored user.
    async fn save(&self, user: &User) -> Result<Option<User>>;

    /// Remove a stored user. Returns `false` when nothing was removed.
    async fn delete(&self, user: &User) -> Result<bool>;
}

/// User record as stored in the database.
#[derive(Debug, Clone, FromRow)]
struct UserRecord {
    id: String,
    username: String,
    password: String,
    roles: Vec<String>,
    active: bool,
}

impl TryFrom<UserRecord> for User {
    type Error = ServerError;

    fn try_from(record: UserRecord) -> Result<Self> {
        Ok(User {
            id: UserId::from(record.id),
            username: record.username,
            password: PasswordHash::parse(record.password)?,
            roles: Roles::parse(record.roles).map_err(|_| {
                ServerError::Internal {
                    details: "stored user has no role".into(),
                    source: None,
                }
            })?,
            active: record.active,
        })
    }
}

/// PostgreSQL user repository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new [`PgUserRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Turn a constraint violation with SQLSTATE `state` into a conflict.
fn conflict_on(err: sqlx::Error, state: &str, message: &str) -> ServerError {
    match err.as_database_error().and_then(|e| e.code()) {
        Some(code) if code == state => ServerError::Conflict(message.into()),
        _ => ServerError::Sql(err),
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_all(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password, roles, active
                FROM users
                ORDER BY created_at, id"#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(User::try_from)
        .collect()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password, roles, active
                FROM users
                WHERE username = $1"#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"SELECT id, username, password, roles, active
                FROM users
                WHERE id = $1"#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(User::try_from)
        .transpose()
    }

    async fn create(&self, user: NewUser) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"INSERT INTO users (username, password, roles, active)
                VALUES ($1, $2, $3, $4)
                RETURNING id, username, password, roles, active"#,
        )
        .bind(&user.username)
        .bind(user.password.as_str())
        .bind(user.roles.as_slice())
        .bind(user.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| conflict_on(err, UNIQUE_VIOLATION, USER_EXISTS))?
        .map(User::try_from)
        .transpose()
    }

    async fn save(&self, user: &User) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRecord>(
            r#"UPDATE users
                SET username = $2, password = $3, roles = $4, active = $5,
                    updated_at = NOW()
                WHERE id = $1
                RETURNING id, username, password, roles, active"#,
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(user.password.as_str())
        .bind(user.roles.as_slice())
        .bind(user.active)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| conflict_on(err, UNIQUE_VIOLATION, USERNAME_TAKEN))?
        .map(User::try_from)
        .transpose()
    }

    async fn delete(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(user.id.as_str())
            .execute(&self.pool)
            .await
            // A note attached since the ownership check.
            .map_err(|err| conflict_on(err, FOREIGN_KEY_VIOLATION, HAS_NOTES))?;

        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Password, PasswordHasher, test_hasher};

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.into(),
            password: test_hasher().hash(&Password::new("p@ss").unwrap()).unwrap(),
            roles: Roles::parse(vec!["Employee".into()]).unwrap(),
            active: true,
        }
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance in DATABASE_URL"]
    async fn test_unique_username_is_enforced(pool: PgPool) {
        let repo = PgUserRepository::new(pool);

        let created = repo.create(new_user("alice")).await.unwrap().unwrap();
        assert_eq!(created.username, "alice");
        assert!(!created.id.as_str().is_empty());

        let duplicate = repo.create(new_user("alice")).await;
        assert!(matches!(duplicate, Err(ServerError::Conflict(_))));
        assert_eq!(repo.find_all().await.unwrap().len(), 1);

        assert!(repo.delete(&created).await.unwrap());
        assert!(repo.find_by_id(&created.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance in DATABASE_URL"]
    async fn test_save_to_taken_username_is_conflict(pool: PgPool) {
        let repo = PgUserRepository::new(pool);

        repo.create(new_user("alice")).await.unwrap().unwrap();
        let mut bob = repo.create(new_user("bob")).await.unwrap().unwrap();

        bob.username = "alice".into();
        match repo.save(&bob).await {
            Err(ServerError::Conflict(message)) => {
                assert_eq!(message, USERNAME_TAKEN)
            },
            other => panic!("expected conflict, got {other:?}"),
        }

        bob.username = "bobby".into();
        let saved = repo.save(&bob).await.unwrap().unwrap();
        assert_eq!(saved.username, "bobby");
    }

    #[sqlx::test]
    #[ignore = "requires a PostgreSQL instance in DATABASE_URL"]
    async fn test_delete_owner_of_notes_is_conflict(pool: PgPool) {
        let repo = PgUserRepository::new(pool.clone());
        let alice = repo.create(new_user("alice")).await.unwrap().unwrap();

        sqlx::query(r#"INSERT INTO notes (user_id, title, text) VALUES ($1, $2, $3)"#)
            .bind(alice.id.as_str())
            .bind("Printer")
            .bind("Fix the printer")
            .execute(&pool)
            .await
            .unwrap();

        match repo.delete(&alice).await {
            Err(ServerError::Conflict(message)) => assert_eq!(message, HAS_NOTES),
            other => panic!("expected conflict, got {other:?}"),
        }
        assert!(repo.find_by_id(&alice.id).await.unwrap().is_some());
    }
}
