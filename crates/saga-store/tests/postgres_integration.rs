//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p saga-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use domain::{SagaRecord, SagaStatus, SagaStep, Version};
use saga_store::{PostgresSagaStore, SagaStore, SagaStoreExt, StoreError};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_records_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresSagaStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE saga_records")
        .execute(&pool)
        .await
        .unwrap();

    PostgresSagaStore::new(pool)
}

fn new_saga(appointment_id: &str) -> SagaRecord {
    SagaRecord::new_booking_saga(appointment_id, 3)
}

#[tokio::test]
#[serial]
async fn save_and_load_round_trip() {
    let store = get_test_store().await;
    let mut saga = new_saga("APT-1");
    saga.mark_step_completed(SagaStep::AppointmentConfirmed);
    saga.booking_id = Some("B-1".into());

    let saved = store.save(saga).await.unwrap();
    assert_eq!(saved.version, Version::new(1));

    let loaded = store.find_by_id(saved.id).await.unwrap().unwrap();
    assert_eq!(loaded.version, Version::new(1));
    assert_eq!(loaded.booking_id.as_deref(), Some("B-1"));
    assert!(loaded.is_step_completed(SagaStep::AppointmentConfirmed));
}

#[tokio::test]
#[serial]
async fn update_with_current_version_succeeds() {
    let store = get_test_store().await;
    let mut saga = store.save(new_saga("APT-1")).await.unwrap();

    saga.status = SagaStatus::Processing;
    let saga = store.save(saga).await.unwrap();
    assert_eq!(saga.version, Version::new(2));

    let loaded = store.find_by_id(saga.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, SagaStatus::Processing);
    assert_eq!(loaded.version, Version::new(2));
}

#[tokio::test]
#[serial]
async fn stale_update_is_a_conflict() {
    let store = get_test_store().await;
    let saga = store.save(new_saga("APT-1")).await.unwrap();

    let writer_a = saga.clone();
    let writer_b = saga;
    store.save(writer_a).await.unwrap();

    let result = store.save(writer_b).await;
    match result {
        Err(StoreError::ConcurrencyConflict {
            expected, actual, ..
        }) => {
            assert_eq!(expected, Version::new(1));
            assert_eq!(actual, Version::new(2));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[serial]
async fn duplicate_appointment_is_rejected() {
    let store = get_test_store().await;
    store.save(new_saga("APT-1")).await.unwrap();

    let result = store.save(new_saga("APT-1")).await;
    assert!(matches!(result, Err(StoreError::DuplicateAppointment(_))));
}

#[tokio::test]
#[serial]
async fn lookups_by_correlation_ids() {
    let store = get_test_store().await;
    let mut saga = new_saga("APT-1");
    saga.booking_id = Some("B-1".into());
    store.save(saga).await.unwrap();

    assert!(store.find_by_booking_id("B-1").await.unwrap().is_some());
    assert!(store.find_by_appointment_id("APT-1").await.unwrap().is_some());
    assert!(store.find_by_appointment_id("APT-404").await.unwrap().is_none());
    assert!(store.exists_by_booking_id("B-1").await.unwrap());
    assert!(!store.exists_by_appointment_id("APT-404").await.unwrap());
}

#[tokio::test]
#[serial]
async fn status_queries() {
    let store = get_test_store().await;

    let mut failed = new_saga("APT-1");
    failed.status = SagaStatus::Failed;
    failed.retry_count = 1;
    failed.compensation_required = true;
    store.save(failed).await.unwrap();

    let mut stale = new_saga("APT-2");
    stale.status = SagaStatus::Processing;
    stale.last_updated_at = Utc::now() - Duration::hours(3);
    store.save(stale).await.unwrap();

    assert_eq!(store.find_by_status(SagaStatus::Failed).await.unwrap().len(), 1);
    assert_eq!(
        store
            .find_by_status_and_retry_count_less_than(SagaStatus::Failed, 1)
            .await
            .unwrap()
            .len(),
        0
    );
    assert_eq!(
        store
            .find_by_compensation_required_and_status(true, SagaStatus::Failed)
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(
        store
            .find_stale(SagaStatus::Processing, Utc::now() - Duration::hours(1))
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(store.find_all().await.unwrap().len(), 2);
    assert_eq!(store.find_retryable().await.unwrap().len(), 1);
}
