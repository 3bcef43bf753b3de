//! SQLite implementation of RecordStore.
//!
//! All records share one table keyed by the record key.

use async_trait::async_trait;
use sea_query::{Expr, LikeExpr, OnConflict, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::storage::schema::{Records, CREATE_RECORDS_TABLE};
use crate::storage::{RecordStore, Result};

/// SQLite record store.
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Create a new SQLite record store on an existing pool.
    ///
    /// Call [`init`](Self::init) before use if the schema may be missing.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to `url` and make sure the schema exists.
    ///
    /// In-memory databases are per connection, so their pool is pinned to a
    /// single connection.
    pub async fn connect(url: &str) -> Result<Self> {
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self::new(pool);
        store.init().await?;
        info!(url = %url, "Connected to SQLite for records");
        Ok(store)
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_RECORDS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Escape LIKE wildcards so a key prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn read_record(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let (sql, values) = Query::select()
            .column(Records::Data)
            .from(Records::Table)
            .and_where(Expr::col(Records::Key).eq(key))
            .build_sqlx(SqliteQueryBuilder);

        let row = sqlx::query_with(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let data: Vec<u8> = row.try_get("data")?;
                debug!(key = %key, "Read record from SQLite");
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn write_record(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let updated_at = chrono::Utc::now().to_rfc3339();
        let len = bytes.len();

        let (sql, values) = Query::insert()
            .into_table(Records::Table)
            .columns([Records::Key, Records::Data, Records::UpdatedAt])
            .values_panic([key.into(), bytes.into(), updated_at.into()])
            .on_conflict(
                OnConflict::column(Records::Key)
                    .update_columns([Records::Data, Records::UpdatedAt])
                    .to_owned(),
            )
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        debug!(key = %key, bytes = len, "Stored record in SQLite");
        Ok(())
    }

    async fn delete_record(&self, key: &str) -> Result<bool> {
        let (sql, values) = Query::delete()
            .from_table(Records::Table)
            .and_where(Expr::col(Records::Key).eq(key))
            .build_sqlx(SqliteQueryBuilder);

        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let (sql, values) = Query::select()
            .column(Records::Key)
            .from(Records::Table)
            .and_where(Expr::col(Records::Key).like(LikeExpr::new(like_prefix(prefix)).escape('\\')))
            .order_by(Records::Key, Order::Asc)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&sql, values).fetch_all(&self.pool).await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            // SQLite LIKE ignores ASCII case
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}
