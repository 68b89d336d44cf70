use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaId;
use domain::{SagaRecord, SagaStatus};

use crate::Result;

/// Durable keyed storage for saga records.
///
/// `save` is compare-and-swap on [`SagaRecord::version`]: the stored record
/// must still be at the version the caller loaded, and a record at the
/// initial version must not exist yet. On success the returned record
/// carries the new version. Lookups that miss return `None` or an empty
/// list. Records are never deleted.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Inserts or updates a record, returning it with its new version.
    async fn save(&self, saga: SagaRecord) -> Result<SagaRecord>;

    async fn find_by_id(&self, id: SagaId) -> Result<Option<SagaRecord>>;

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<SagaRecord>>;

    async fn find_by_appointment_id(&self, appointment_id: &str) -> Result<Option<SagaRecord>>;

    /// Returns records in the given status, oldest first.
    async fn find_by_status(&self, status: SagaStatus) -> Result<Vec<SagaRecord>>;

    /// Returns records in `status` whose retry count is below `retry_count`.
    async fn find_by_status_and_retry_count_less_than(
        &self,
        status: SagaStatus,
        retry_count: u32,
    ) -> Result<Vec<SagaRecord>>;

    async fn find_by_compensation_required_and_status(
        &self,
        compensation_required: bool,
        status: SagaStatus,
    ) -> Result<Vec<SagaRecord>>;

    /// Returns records in `status` not updated since `before`.
    async fn find_stale(
        &self,
        status: SagaStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<SagaRecord>>;

    /// Returns every record, oldest first.
    async fn find_all(&self) -> Result<Vec<SagaRecord>>;
}

#[async_trait]
impl<T: SagaStore + ?Sized> SagaStore for Arc<T> {
    async fn save(&self, saga: SagaRecord) -> Result<SagaRecord> {
        (**self).save(saga).await
    }

    async fn find_by_id(&self, id: SagaId) -> Result<Option<SagaRecord>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<SagaRecord>> {
        (**self).find_by_booking_id(booking_id).await
    }

    async fn find_by_appointment_id(&self, appointment_id: &str) -> Result<Option<SagaRecord>> {
        (**self).find_by_appointment_id(appointment_id).await
    }

    async fn find_by_status(&self, status: SagaStatus) -> Result<Vec<SagaRecord>> {
        (**self).find_by_status(status).await
    }

    async fn find_by_status_and_retry_count_less_than(
        &self,
        status: SagaStatus,
        retry_count: u32,
    ) -> Result<Vec<SagaRecord>> {
        (**self)
            .find_by_status_and_retry_count_less_than(status, retry_count)
            .await
    }

    async fn find_by_compensation_required_and_status(
        &self,
        compensation_required: bool,
        status: SagaStatus,
    ) -> Result<Vec<SagaRecord>> {
        (**self)
            .find_by_compensation_required_and_status(compensation_required, status)
            .await
    }

    async fn find_stale(
        &self,
        status: SagaStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<SagaRecord>> {
        (**self).find_stale(status, before).await
    }

    async fn find_all(&self) -> Result<Vec<SagaRecord>> {
        (**self).find_all().await
    }
}

/// Extension trait providing convenience methods for saga stores.
#[async_trait]
pub trait SagaStoreExt: SagaStore {
    async fn exists_by_appointment_id(&self, appointment_id: &str) -> Result<bool> {
        Ok(self.find_by_appointment_id(appointment_id).await?.is_some())
    }

    async fn exists_by_booking_id(&self, booking_id: &str) -> Result<bool> {
        Ok(self.find_by_booking_id(booking_id).await?.is_some())
    }

    /// Returns failed or retrying records that still have retries left.
    async fn find_retryable(&self) -> Result<Vec<SagaRecord>> {
        Ok(self
            .find_all()
            .await?
            .into_iter()
            .filter(|saga| saga.status.is_retryable() && saga.can_retry())
            .collect())
    }
}

// Blanket implementation for all SagaStore implementations
impl<T: SagaStore + ?Sized> SagaStoreExt for T {}
