//! Notes, as far as users are concerned: who owns what.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::user::UserId;

/// Note as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Note {
    pub id: i64,
    /// Owner of the note.
    #[sqlx(rename = "user_id", try_from = "String")]
    pub user: UserId,
    pub title: String,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Port for note lookups.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Notes owned by a user.
    async fn find_by_user(&self, user: &UserId) -> Result<Vec<Note>>;
}

/// PostgreSQL note repository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: PgPool,
}

impl PgNoteRepository {
    /// Create a new [`PgNoteRepository`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn find_by_user(&self, user: &UserId) -> Result<Vec<Note>> {
        Ok(sqlx::query_as::<_, Note>(
            r#"SELECT id, user_id, title, text, completed, created_at, updated_at
                FROM notes
                WHERE user_id = $1"#,
        )
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await?)
    }
}

/// In-memory implementation of [`NoteRepository`].
#[derive(Debug, Default, Clone)]
pub struct InMemoryNoteRepository {
    notes: Arc<RwLock<Vec<Note>>>,
}

impl InMemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new note to `user`.
    pub async fn insert(
        &self,
        user: &UserId,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Note {
        let mut notes = self.notes.write().await;
        let now = Utc::now();
        let note = Note {
            id: notes.len() as i64 + 1,
            user: user.clone(),
            title: title.into(),
            text: text.into(),
            completed: false,
            created_at: now,
            updated_at: now,
        };
        notes.push(note.clone());
        note
    }
}

#[async_trait]
impl NoteRepository for InMemoryNoteRepository {
    async fn find_by_user(&self, user: &UserId) -> Result<Vec<Note>> {
        let notes = self.notes.read().await;
        Ok(notes.iter().filter(|n| &n.user == user).cloned().collect())
    }
}
