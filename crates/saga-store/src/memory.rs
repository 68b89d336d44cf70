use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{SagaId, Version};
use domain::{SagaRecord, SagaStatus};
use tokio::sync::RwLock;

use crate::{Result, StoreError, store::SagaStore};

/// In-memory saga store for tests and single-process deployments.
///
/// Provides the same versioning and uniqueness guarantees as the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    sagas: Arc<RwLock<HashMap<SagaId, SagaRecord>>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored.
    pub async fn saga_count(&self) -> usize {
        self.sagas.read().await.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.sagas.write().await.clear();
    }

    async fn select<F>(&self, predicate: F) -> Vec<SagaRecord>
    where
        F: Fn(&SagaRecord) -> bool,
    {
        let store = self.sagas.read().await;
        let mut sagas: Vec<_> = store.values().filter(|s| predicate(s)).cloned().collect();
        sagas.sort_by_key(|s| (s.started_at, s.id));
        sagas
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn save(&self, mut saga: SagaRecord) -> Result<SagaRecord> {
        let mut store = self.sagas.write().await;

        let current_version = store
            .get(&saga.id)
            .map(|s| s.version)
            .unwrap_or(Version::initial());

        if saga.version != current_version {
            return Err(StoreError::ConcurrencyConflict {
                saga_id: saga.id,
                expected: saga.version,
                actual: current_version,
            });
        }

        // Unique index simulation on appointment_id
        if current_version.is_initial()
            && store
                .values()
                .any(|s| s.appointment_id == saga.appointment_id)
        {
            return Err(StoreError::DuplicateAppointment(saga.appointment_id));
        }

        saga.version = current_version.next();
        store.insert(saga.id, saga.clone());
        Ok(saga)
    }

    async fn find_by_id(&self, id: SagaId) -> Result<Option<SagaRecord>> {
        Ok(self.sagas.read().await.get(&id).cloned())
    }

    async fn find_by_booking_id(&self, booking_id: &str) -> Result<Option<SagaRecord>> {
        Ok(self
            .select(|s| s.booking_id.as_deref() == Some(booking_id))
            .await
            .into_iter()
            .next())
    }

    async fn find_by_appointment_id(&self, appointment_id: &str) -> Result<Option<SagaRecord>> {
        Ok(self
            .select(|s| s.appointment_id == appointment_id)
            .await
            .into_iter()
            .next())
    }

    async fn find_by_status(&self, status: SagaStatus) -> Result<Vec<SagaRecord>> {
        Ok(self.select(|s| s.status == status).await)
    }

    async fn find_by_status_and_retry_count_less_than(
        &self,
        status: SagaStatus,
        retry_count: u32,
    ) -> Result<Vec<SagaRecord>> {
        Ok(self
            .select(|s| s.status == status && s.retry_count < retry_count)
            .await)
    }

    async fn find_by_compensation_required_and_status(
        &self,
        compensation_required: bool,
        status: SagaStatus,
    ) -> Result<Vec<SagaRecord>> {
        Ok(self
            .select(|s| s.compensation_required == compensation_required && s.status == status)
            .await)
    }

    async fn find_stale(
        &self,
        status: SagaStatus,
        before: DateTime<Utc>,
    ) -> Result<Vec<SagaRecord>> {
        Ok(self
            .select(|s| s.status == status && s.last_updated_at < before)
            .await)
    }

    async fn find_all(&self) -> Result<Vec<SagaRecord>> {
        Ok(self.select(|_| true).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SagaStoreExt;
    use chrono::Duration;

    fn new_saga(appointment_id: &str) -> SagaRecord {
        SagaRecord::new_booking_saga(appointment_id, 3)
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let store = InMemorySagaStore::new();
        let saved = store.save(new_saga("APT-1")).await.unwrap();

        assert_eq!(saved.version, Version::new(1));
        let found = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(found, saved);
    }

    #[tokio::test]
    async fn save_advances_version() {
        let store = InMemorySagaStore::new();
        let mut saga = store.save(new_saga("APT-1")).await.unwrap();
        saga.status = SagaStatus::Processing;
        let saga = store.save(saga).await.unwrap();
        assert_eq!(saga.version, Version::new(2));
        assert_eq!(store.saga_count().await, 1);
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let store = InMemorySagaStore::new();
        let saved = store.save(new_saga("APT-1")).await.unwrap();

        let first = saved.clone();
        let second = saved;
        store.save(first).await.unwrap();

        let result = store.save(second).await;
        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict {
                expected,
                actual,
                ..
            }) if expected == Version::new(1) && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn duplicate_appointment_is_rejected() {
        let store = InMemorySagaStore::new();
        store.save(new_saga("APT-1")).await.unwrap();

        let result = store.save(new_saga("APT-1")).await;
        assert!(matches!(result, Err(StoreError::DuplicateAppointment(id)) if id == "APT-1"));
        assert_eq!(store.saga_count().await, 1);
    }

    #[tokio::test]
    async fn find_by_correlation_ids() {
        let store = InMemorySagaStore::new();
        let mut saga = new_saga("APT-1");
        saga.booking_id = Some("B-1".into());
        store.save(saga).await.unwrap();

        assert!(store.find_by_booking_id("B-1").await.unwrap().is_some());
        assert!(store.find_by_booking_id("B-2").await.unwrap().is_none());
        assert!(store.exists_by_appointment_id("APT-1").await.unwrap());
        assert!(!store.exists_by_appointment_id("APT-2").await.unwrap());
        assert!(store.exists_by_booking_id("B-1").await.unwrap());
    }

    #[tokio::test]
    async fn status_queries() {
        let store = InMemorySagaStore::new();

        let mut failed = new_saga("APT-1");
        failed.status = SagaStatus::Failed;
        failed.retry_count = 1;
        failed.compensation_required = true;
        store.save(failed).await.unwrap();

        let mut exhausted = new_saga("APT-2");
        exhausted.status = SagaStatus::Failed;
        exhausted.retry_count = 3;
        store.save(exhausted).await.unwrap();

        let mut processing = new_saga("APT-3");
        processing.status = SagaStatus::Processing;
        processing.last_updated_at = Utc::now() - Duration::hours(2);
        store.save(processing).await.unwrap();

        assert_eq!(store.find_by_status(SagaStatus::Failed).await.unwrap().len(), 2);
        assert_eq!(
            store
                .find_by_status_and_retry_count_less_than(SagaStatus::Failed, 3)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            store
                .find_by_compensation_required_and_status(true, SagaStatus::Failed)
                .await
                .unwrap()
                .len(),
            1
        );
        let stale = store
            .find_stale(SagaStatus::Processing, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].appointment_id, "APT-3");

        let retryable = store.find_retryable().await.unwrap();
        assert_eq!(retryable.len(), 1);
        assert_eq!(retryable[0].appointment_id, "APT-1");
    }

    #[tokio::test]
    async fn find_all_is_ordered_by_start() {
        let store = InMemorySagaStore::new();
        for n in 0..3 {
            let mut saga = new_saga(&format!("APT-{n}"));
            saga.started_at = Utc::now() - Duration::minutes(10 - n);
            store.save(saga).await.unwrap();
        }
        let all = store.find_all().await.unwrap();
        let ids: Vec<_> = all.iter().map(|s| s.appointment_id.as_str()).collect();
        assert_eq!(ids, vec!["APT-0", "APT-1", "APT-2"]);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let store = InMemorySagaStore::new();
        store.save(new_saga("APT-1")).await.unwrap();
        store.clear().await;
        assert_eq!(store.saga_count().await, 0);
    }
}
