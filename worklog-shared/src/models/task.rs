//! Task model and database operations
//!
//! A task is one worklog entry. Every query here is scoped by the owning
//! user, so a caller can never read or touch another user's rows.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE tasks (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     user_id UUID NOT NULL,
//!     title VARCHAR(100) NOT NULL,
//!     description TEXT,
//!     image_url TEXT,
//!     excel_url TEXT,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use worklog_shared::models::task::{NewTask, Task};
//! use worklog_shared::db::pool::{create_pool, DatabaseConfig};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//! let user_id = Uuid::new_v4();
//!
//! let task = Task::create(&pool, NewTask {
//!     user_id,
//!     title: "Release notes".to_string(),
//!     description: "Drafted the notes for 1.4".to_string(),
//!     image_url: None,
//!     excel_url: None,
//! }).await?;
//!
//! let tasks = Task::list_by_user(&pool, user_id).await?;
//! assert_eq!(tasks[0].id, task.id);
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// A worklog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Owner; only this user can see or change the row
    pub user_id: Uuid,

    pub title: String,

    /// Nullable in storage even though the form always requires it
    pub description: Option<String>,

    /// Public URL of the attached screenshot or photo
    pub image_url: Option<String>,

    /// Public URL of the attached spreadsheet
    pub excel_url: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Input for inserting a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub excel_url: Option<String>,
}

/// Fields an edit can change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskChanges {
    pub title: String,
    pub description: String,
}

impl Task {
    /// Inserts a task and returns the stored row
    pub async fn create(pool: &PgPool, data: NewTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, title, description, image_url, excel_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, title, description, image_url, excel_url, created_at
            "#,
        )
        .bind(data.user_id)
        .bind(data.title)
        .bind(data.description)
        .bind(data.image_url)
        .bind(data.excel_url)
        .fetch_one(pool)
        .await?;

        Ok(task)
    }

    /// Finds one of the user's tasks
    pub async fn find_by_id_and_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, image_url, excel_url, created_at
            FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(task)
    }

    /// Lists the user's tasks, newest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let tasks = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, description, image_url, excel_url, created_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(tasks)
    }

    /// Updates title and description of one of the user's tasks
    ///
    /// Returns the number of rows affected; 0 when the task does not exist
    /// or belongs to someone else.
    pub async fn update_for_user(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        changes: &TaskChanges,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET title = $3, description = $4
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&changes.title)
        .bind(&changes.description)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes one of the user's tasks
    ///
    /// Returns the number of rows affected; 0 when the task does not exist
    /// or belongs to someone else.
    pub async fn delete_for_user(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Counts the user's tasks
    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Applies an edit to an in-memory copy
    pub fn apply(&mut self, changes: &TaskChanges) {
        self.title = changes.title.clone();
        self.description = Some(changes.description.clone());
    }
}

impl From<NewTask> for Task {
    /// Builds the row a store would return for `data`, with a fresh id and
    /// the current time
    fn from(data: NewTask) -> Self {
        Task {
            id: Uuid::new_v4(),
            user_id: data.user_id,
            title: data.title,
            description: Some(data.description),
            image_url: data.image_url,
            excel_url: data.excel_url,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(user_id: Uuid) -> NewTask {
        NewTask {
            user_id,
            title: "Inbox zero".to_string(),
            description: "Answered support tickets".to_string(),
            image_url: Some("https://cdn.example.com/a.png".to_string()),
            excel_url: None,
        }
    }

    #[test]
    fn test_from_new_task() {
        let user_id = Uuid::new_v4();
        let task = Task::from(new_task(user_id));

        assert_eq!(task.user_id, user_id);
        assert_eq!(task.title, "Inbox zero");
        assert_eq!(task.description.as_deref(), Some("Answered support tickets"));
        assert_eq!(task.image_url.as_deref(), Some("https://cdn.example.com/a.png"));
        assert!(task.excel_url.is_none());
    }

    #[test]
    fn test_apply_changes() {
        let mut task = Task::from(new_task(Uuid::new_v4()));
        let id = task.id;

        task.apply(&TaskChanges {
            title: "Inbox zero, again".to_string(),
            description: "Answered even more tickets".to_string(),
        });

        assert_eq!(task.id, id);
        assert_eq!(task.title, "Inbox zero, again");
        assert_eq!(task.description.as_deref(), Some("Answered even more tickets"));
        assert_eq!(task.image_url.as_deref(), Some("https://cdn.example.com/a.png"));
    }

    #[test]
    fn test_serialization_field_names() {
        let task = Task::from(new_task(Uuid::new_v4()));
        let json = serde_json::to_value(&task).unwrap();

        assert!(json.get("image_url").is_some());
        assert!(json.get("excel_url").is_some());
        assert!(json.get("created_at").is_some());
    }
}
