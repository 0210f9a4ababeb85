use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool, Postgres, Transaction};

use crate::config::WarehouseConfig;
use crate::errors::{AppError, ResultExt};

/// Exclusive warehouse connection for one run.
///
/// Backed by a single-connection pool: a run never issues concurrent
/// statements, and an open transaction holds the only connection.
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(config: &WarehouseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&config.database_url)
            .await
            .context("Failed to connect to warehouse")?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .context("Warehouse connection check failed")?;

        Ok(Self { pool })
    }

    /// Runs a single statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str) -> Result<u64, AppError> {
        let result = sqlx::query(sql)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Statement failed: {}", first_line(sql)))?;
        Ok(result.rows_affected())
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool
            .begin()
            .await
            .context("Failed to open warehouse transaction")
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Runs a single statement on an explicit connection (usually an open
/// transaction), returning the number of rows affected.
pub async fn execute_on(conn: &mut PgConnection, sql: &str) -> Result<u64, AppError> {
    let result = sqlx::query(sql)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("Statement failed: {}", first_line(sql)))?;
    Ok(result.rows_affected())
}

/// First non-empty line of a statement, for error messages.
pub(crate) fn first_line(sql: &str) -> &str {
    sql.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}
