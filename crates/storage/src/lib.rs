use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::RwLock;
use tracing::debug;

use shared::domain::FormType;

/// Persisted form drafts, one per form type. Saving overwrites; values are never merged.
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, form_type: FormType, values: &Value) -> Result<()>;
    async fn read_draft(&self, form_type: FormType) -> Result<Option<Value>>;
    /// Removing an absent draft is a no-op.
    async fn clear_draft(&self, form_type: FormType) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDraft {
    pub form_type: FormType,
    pub values: Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if sqlite_path(database_url).is_none() {
            // Every connection to an in-memory url opens a distinct database.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open draft database '{database_url}'"))?;
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

    pub async fn list_drafts(&self) -> Result<Vec<StoredDraft>> {
        let rows = sqlx::query(
            "SELECT form_type, values_json, updated_at FROM form_drafts ORDER BY form_type",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut drafts = Vec::with_capacity(rows.len());
        for row in rows {
            let raw_form_type: String = row.try_get("form_type")?;
            let Some(form_type) = FormType::parse(&raw_form_type) else {
                debug!(form_type = %raw_form_type, "drafts: skipping unknown form type");
                continue;
            };
            let values_json: String = row.try_get("values_json")?;
            drafts.push(StoredDraft {
                form_type,
                values: decode_values(form_type, &values_json)?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(drafts)
    }
}

#[async_trait]
impl DraftStore for Storage {
    async fn save_draft(&self, form_type: FormType, values: &Value) -> Result<()> {
        let values_json = serde_json::to_string(values)?;
        sqlx::query(
            "INSERT INTO form_drafts (form_type, values_json, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(form_type) DO UPDATE SET values_json = excluded.values_json, updated_at = excluded.updated_at",
        )
        .bind(form_type.as_str())
        .bind(values_json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save {form_type} draft"))?;
        Ok(())
    }

    async fn read_draft(&self, form_type: FormType) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT values_json FROM form_drafts WHERE form_type = ?")
            .bind(form_type.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| decode_values(form_type, &r.get::<String, _>(0)))
            .transpose()
    }

    async fn clear_draft(&self, form_type: FormType) -> Result<()> {
        sqlx::query("DELETE FROM form_drafts WHERE form_type = ?")
            .bind(form_type.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear {form_type} draft"))?;
        Ok(())
    }
}

fn decode_values(form_type: FormType, values_json: &str) -> Result<Value> {
    serde_json::from_str(values_json)
        .with_context(|| format!("stored {form_type} draft is not valid json"))
}

/// Draft store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<FormType, Value>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save_draft(&self, form_type: FormType, values: &Value) -> Result<()> {
        self.drafts.write().await.insert(form_type, values.clone());
        Ok(())
    }

    async fn read_draft(&self, form_type: FormType) -> Result<Option<Value>> {
        Ok(self.drafts.read().await.get(&form_type).cloned())
    }

    async fn clear_draft(&self, form_type: FormType) -> Result<()> {
        self.drafts.write().await.remove(&form_type);
        Ok(())
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
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
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
