//! PostgreSQL task store
//!
//! Thin adapter from [`TaskStore`] onto the queries in
//! [`crate::models::task`]. Change notifications come from the table
//! trigger, not from here.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{BackendResult, TaskStore};
use crate::models::task::{NewTask, Task, TaskChanges};

#[derive(Debug, Clone)]
pub struct PgTaskStore {
    pool: PgPool,
}

impl PgTaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    async fn list_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Task>> {
        Ok(Task::list_by_user(&self.pool, user_id).await?)
    }

    async fn insert(&self, task: NewTask) -> BackendResult<Task> {
        Ok(Task::create(&self.pool, task).await?)
    }

    async fn update_for_user(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        changes: &TaskChanges,
    ) -> BackendResult<u64> {
        Ok(Task::update_for_user(&self.pool, task_id, user_id, changes).await?)
    }

    async fn delete_for_user(&self, user_id: Uuid, task_id: Uuid) -> BackendResult<u64> {
        Ok(Task::delete_for_user(&self.pool, task_id, user_id).await?)
    }
}
