use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::{
    domain::{TodoId, TodoRecord},
    protocol::{CreateTodoRequest, UpdateTodoRequest},
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    Applied,
    /// Nothing was written; these ids do not exist.
    Missing(Vec<TodoId>),
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// All todos, ascending by position with creation time and id as tie breakers.
    pub async fn list_todos(&self) -> Result<Vec<TodoRecord>> {
        let rows = sqlx::query(
            "SELECT id, title, description, due_date, completed, created_at, position
             FROM todos
             ORDER BY position ASC, created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list todos")?;
        Ok(rows.iter().map(todo_from_row).collect())
    }

    pub async fn get_todo(&self, id: TodoId) -> Result<Option<TodoRecord>> {
        let row = sqlx::query(
            "SELECT id, title, description, due_date, completed, created_at, position
             FROM todos
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load todo {id}"))?;
        Ok(row.as_ref().map(todo_from_row))
    }

    /// Inserts an already validated todo. Without an explicit order it lands after
    /// the current last item, or at 0 in an empty collection.
    pub async fn create_todo(&self, request: &CreateTodoRequest) -> Result<TodoId> {
        let order = match request.order {
            Some(order) => order,
            None => self.next_position().await?,
        };

        let rec = sqlx::query(
            "INSERT INTO todos (title, description, due_date, completed, created_at, position)
             VALUES (?, ?, ?, 0, ?, ?)
             RETURNING id",
        )
        .bind(&request.title)
        .bind(request.description.as_deref())
        .bind(request.due_date)
        .bind(Utc::now().timestamp_millis())
        .bind(order)
        .fetch_one(&self.pool)
        .await
        .context("failed to insert todo")?;
        Ok(TodoId(rec.get::<i64, _>(0)))
    }

    async fn next_position(&self) -> Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(position) FROM todos")
            .fetch_one(&self.pool)
            .await
            .context("failed to read max todo position")?;
        Ok(max.map_or(0, |max| max + 1))
    }

    /// Applies the provided fields only. Returns `false` when the todo does not exist.
    pub async fn update_todo(&self, id: TodoId, patch: &UpdateTodoRequest) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE todos SET
                title = COALESCE(?, title),
                description = CASE WHEN ? THEN NULL ELSE COALESCE(?, description) END,
                due_date = CASE WHEN ? THEN NULL ELSE COALESCE(?, due_date) END,
                completed = COALESCE(?, completed)
             WHERE id = ?",
        )
        .bind(patch.title.as_deref())
        .bind(patch.clear_description)
        .bind(patch.description.as_deref())
        .bind(patch.clear_due_date)
        .bind(patch.due_date)
        .bind(patch.completed)
        .bind(id.0)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to update todo {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Flips `completed` and returns the new value, or `None` for an unknown id.
    pub async fn toggle_todo(&self, id: TodoId) -> Result<Option<bool>> {
        let row = sqlx::query(
            "UPDATE todos SET completed = NOT completed WHERE id = ? RETURNING completed",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to toggle todo {id}"))?;
        Ok(row.map(|r| r.get::<bool, _>(0)))
    }

    pub async fn delete_todo(&self, id: TodoId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to delete todo {id}"))?;
        Ok(result.rows_affected() > 0)
    }

    /// Assigns `position = index` to each id in one transaction. Ids outside the
    /// sequence keep their position. Any unknown id aborts the whole batch.
    pub async fn reorder_todos(&self, ids: &[TodoId]) -> Result<ReorderOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("failed to start reorder transaction")?;

        let mut missing = Vec::new();
        for (index, id) in ids.iter().enumerate() {
            let result = sqlx::query("UPDATE todos SET position = ? WHERE id = ?")
                .bind(index as i64)
                .bind(id.0)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("failed to move todo {id} to {index}"))?;
            if result.rows_affected() == 0 {
                missing.push(*id);
            }
        }

        if !missing.is_empty() {
            tx.rollback()
                .await
                .context("failed to roll back reorder transaction")?;
            return Ok(ReorderOutcome::Missing(missing));
        }

        tx.commit()
            .await
            .context("failed to commit reorder transaction")?;
        Ok(ReorderOutcome::Applied)
    }

    /// Renumbers the whole collection to 0..n in its current display order.
    pub async fn compact_order(&self) -> Result<usize> {
        let ids: Vec<TodoId> = self.list_todos().await?.into_iter().map(|t| t.id).collect();
        match self.reorder_todos(&ids).await? {
            ReorderOutcome::Applied => Ok(ids.len()),
            ReorderOutcome::Missing(missing) => {
                anyhow::bail!("todos vanished during compaction: {missing:?}")
            }
        }
    }
}

fn todo_from_row(r: &SqliteRow) -> TodoRecord {
    TodoRecord {
        id: TodoId(r.get::<i64, _>(0)),
        title: r.get::<String, _>(1),
        description: r.get::<Option<String>, _>(2),
        due_date: r.get::<Option<i64>, _>(3),
        completed: r.get::<bool, _>(4),
        created_at: r.get::<i64, _>(5),
        order: r.get::<i64, _>(6),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
