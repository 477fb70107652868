use crate::config::DatabaseConfig;
use crate::error::ServiceSyncResult;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{AssertSqlSafe, PgPool, Postgres, Transaction};
use std::time::Duration;
use tracing::debug;

const CURSOR_NAME: &str = "service_records_cursor";

/// Write side of the reporting table.
#[async_trait]
pub trait ReportingStore: Send + Sync {
    /// Runs a statement and returns the number of affected rows.
    async fn execute(&self, sql: &str) -> ServiceSyncResult<u64>;
}

/// Read side of the reporting table: server-side cursors over a query.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn open_cursor(&self, query: &str) -> ServiceSyncResult<Box<dyn RecordCursor>>;
}

/// An open cursor. Every row is handed out as a JSON object keyed by column
/// name; decoding is left to the caller.
///
/// Dropping a cursor without calling [`RecordCursor::close`] must still
/// release the underlying connection.
#[async_trait]
pub trait RecordCursor: Send {
    async fn read(&mut self, count: usize) -> ServiceSyncResult<Vec<serde_json::Value>>;
    async fn close(self: Box<Self>) -> ServiceSyncResult<()>;
}

#[derive(Clone)]
pub struct PgReportingStore {
    pool: PgPool
}

impl PgReportingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> ServiceSyncResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(Duration::from_millis(config.idle_timeout_ms))
            .connect(&config.url)
            .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ReportingStore for PgReportingStore {
    async fn execute(&self, sql: &str) -> ServiceSyncResult<u64> {
        let result = sqlx::query(AssertSqlSafe(sql)).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RecordSource for PgReportingStore {
    async fn open_cursor(&self, query: &str) -> ServiceSyncResult<Box<dyn RecordCursor>> {
        let mut tx = self.pool.begin().await?;

        let declare = format!(
            "DECLARE {} NO SCROLL CURSOR FOR SELECT to_jsonb(q) AS record FROM ({}) AS q",
            CURSOR_NAME,
            query.trim().trim_end_matches(';')
        );
        sqlx::query(AssertSqlSafe(declare.as_str()))
            .execute(&mut *tx)
            .await?;
        debug!(cursor = CURSOR_NAME, "Cursor opened");

        Ok(Box::new(PgRecordCursor { tx }))
    }
}

/// Cursor living inside its own transaction. Dropping the transaction rolls
/// it back, which also closes the cursor.
struct PgRecordCursor {
    tx: Transaction<'static, Postgres>
}

#[async_trait]
impl RecordCursor for PgRecordCursor {
    async fn read(&mut self, count: usize) -> ServiceSyncResult<Vec<serde_json::Value>> {
        let fetch = format!("FETCH FORWARD {} FROM {}", count, CURSOR_NAME);
        let rows: Vec<serde_json::Value> = sqlx::query_scalar(AssertSqlSafe(fetch.as_str()))
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows)
    }

    async fn close(self: Box<Self>) -> ServiceSyncResult<()> {
        let mut tx = self.tx;
        let close = format!("CLOSE {}", CURSOR_NAME);
        sqlx::query(AssertSqlSafe(close.as_str()))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(cursor = CURSOR_NAME, "Cursor closed");
        Ok(())
    }
}
