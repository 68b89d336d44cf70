use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SagaId, Version};
use domain::{SagaRecord, SagaStatus};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{Result, StoreError, store::SagaStore};

const SELECT_RECORD: &str = "SELECT record, version FROM saga_records";

/// PostgreSQL-backed saga store.
///
/// The full record is kept as JSONB; the columns used by lookups are
/// duplicated next to it so they can be indexed.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool to `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_saga(row: PgRow) -> Result<SagaRecord> {
        let record: serde_json::Value = row.try_get("record")?;
        let mut saga: SagaRecord = serde_json::from_value(record)?;
        // The column is authoritative; the JSON copy lags one save behind.
        saga.version = Version::new(row.try_get("version")?);
        Ok(saga)
    }

    async fn current_version(&self, id: SagaId) -> Result<Version> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM saga_records WHERE id = $1")
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(version.map(Version::new).unwrap_or(Version::initial()))
    }

    async fn fetch_many(&self, sql: &str, binds: Vec<Bind<'_>>) -> Result<Vec<SagaRecord>> {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = match bind {
                Bind::Text(value) => query.bind(value),
                Bind::Int(value) => query.bind(value),
                Bind::Bool(value) => query.bind(value),
                Bind::Timestamp(value) => query.bind(value),
            };
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_saga).collect()
    }

    async fn fetch_one(&self, sql: &str, value: &str) -> Result<Option<SagaRecord>> {
        let row: Option<PgRow> = sqlx::query(sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_saga).transpose()
    }
}

enum Bind<'a> {
    Text(&'a str),
    Int(i32),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

#[async_trait]
impl SagaStore for PostgresSagaStore {
    async fn save(&self, saga: SagaRecord) -> Result<SagaRecord> {
        let expected = saga.version;
        let next = expected.next();
        let record = serde_json::to_value(&saga)?;
        let retry_count = i32::try_from(saga.retry_count).unwrap_or(i32::MAX);

        if expected.is_initial() {
            sqlx::query(
                r#"
                INSERT INTO saga_records (id, saga_type, appointment_id, booking_id, status,
                    retry_count, compensation_required, started_at, last_updated_at, version, record)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(saga.id.as_uuid())
            .bind(&saga.saga_type)
            .bind(&saga.appointment_id)
            .bind(saga.booking_id.as_deref())
            .bind(saga.status.as_str())
            .bind(retry_count)
            .bind(saga.compensation_required)
            .bind(saga.started_at)
            .bind(saga.last_updated_at)
            .bind(next.as_i64())
            .bind(record)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    match db_err.constraint() {
                        Some("unique_saga_appointment") => {
                            return StoreError::DuplicateAppointment(saga.appointment_id.clone());
                        }
                        Some("saga_records_pkey") => {
                            return StoreError::ConcurrencyConflict {
                                saga_id: saga.id,
                                expected,
                                actual: expected.next(),
                            };
                        }
                        _ => {}
                    }
                }
                StoreError::Database(e)
            })?;
        } else {
            let result = sqlx::query(
                r#"
                UPDATE saga_records
                SET booking_id = $2, status = $3, retry_count = $4, compensation_required = $5,
                    last_updated_at = $6, version = $7, record = $8
                WHERE id = $1 AND version = $9
                "#,
            )
            .bind(saga.id.as_uuid())
            .bind(saga.booking_id.as_deref())
            .bind(saga.status.as_str())
            .bind(retry_count)
            .bind(saga.compensation_required)
            .bind(saga.last_updated_at)
            .bind(next.as_i64())
            .bind(record)
            .bind(expected.as_i64())
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                let actual = self.current_version(saga.id).await?;
                return Err(StoreError::ConcurrencyConflict {
                    saga_id: saga.id,
                    expected,
                    actual,
                });
            }
        }

        tracing::debug!(saga_id = %saga.id, version = %next, "saga record saved");
        Ok(SagaRecord {
            version: next,
            ..saga
        })
    }

    async fn find_by_id(&self, id: SagaId) -> Result<Option<SagaRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!("{SELECT_RECORD} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_saga).transpose()
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<SagaRecord>> {
        self.fetch_one(
            &format!("{SELECT_RECORD} WHERE booking_id = $1 ORDER BY started_at ASC LIMIT 1"),
            booking_id,
        )
        .await
    }

    async fn find_by_appointment_id(&self, appointment_id: &str) -> Result<Option<SagaRecord>> {
        self.fetch_one(
            &format!("{SELECT_RECORD} WHERE appointment_id = $1"),
            appointment_id,
        )
        .await
    }

    async fn find_by_status(&self, status: SagaStatus) -> Result<Vec<SagaRecord>> {
        self.fetch_many(
            &format!("{SELECT_RECORD} WHERE status = $1 ORDER BY started_at ASC, id ASC"),
            vec![Bind::Text(status.as_str())],
        )
        .await
    }

    async fn find_by_status_and_retry_count_less_than(
        &self,
        status: SagaStatus,
        retry_count: u32,
    ) -> Result<Vec<SagaRecord>> {
        self.fetch_many(
            &format!(
                "{SELECT_RECORD} WHERE status = $1 AND retry_count < $2 ORDER BY started_at ASC, id ASC"
            ),
            vec![
                Bind::Text(status.as_str()),
                Bind::Int(i32::try_from(retry_count).unwrap_or(i32::MAX)),
            ],
        )
        .await
    }

    async fn find_by_compensation_required_and_status(
        &self,
        compensation_required: bool,
        status: SagaStatus,
    ) -> Result<Vec<SagaRecord>> {
        self.fetch_many(
            &format!(
                "{SELECT_RECORD} WHERE compensation_required = $1 AND status = $2 ORDER BY started_at ASC, id ASC"
            ),
            vec![
                Bind::Bool(compensation_required),
                Bind::Text(status.as_str()),
            ],
        )
        .await
    }

    async fn find_stale(
        &self,
        status: SagaStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<SagaRecord>> {
        self.fetch_many(
            &format!(
                "{SELECT_RECORD} WHERE status = $1 AND last_updated_at < $2 ORDER BY started_at ASC, id ASC"
            ),
            vec![Bind::Text(status.as_str()), Bind::Timestamp(before)],
        )
        .await
    }

    async fn find_all(&self) -> Result<Vec<SagaRecord>> {
        self.fetch_many(
            &format!("{SELECT_RECORD} ORDER BY started_at ASC, id ASC"),
            Vec::new(),
        )
        .await
    }
}
