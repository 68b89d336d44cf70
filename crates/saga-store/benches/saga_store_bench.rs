use criterion::{Criterion, criterion_group, criterion_main};
use domain::{SagaRecord, SagaStatus};
use saga_store::{InMemorySagaStore, SagaStore};

fn bench_save_new_saga(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("saga_store/save_new_saga", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemorySagaStore::new();
                store
                    .save(SagaRecord::new_booking_saga("APT-1", 3))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_versioned_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemorySagaStore::new();
    let mut saga = rt
        .block_on(store.save(SagaRecord::new_booking_saga("APT-1", 3)))
        .unwrap();

    c.bench_function("saga_store/versioned_update", |b| {
        b.iter(|| {
            saga.touch();
            saga = rt.block_on(store.save(saga.clone())).unwrap();
        });
    });
}

fn bench_find_by_status(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemorySagaStore::new();
    rt.block_on(async {
        for n in 0..1_000 {
            let mut saga = SagaRecord::new_booking_saga(format!("APT-{n}"), 3);
            if n % 10 == 0 {
                saga.status = SagaStatus::Failed;
            }
            store.save(saga).await.unwrap();
        }
    });

    c.bench_function("saga_store/find_by_status_1000", |b| {
        b.iter(|| {
            rt.block_on(store.find_by_status(SagaStatus::Failed))
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_save_new_saga,
    bench_versioned_update,
    bench_find_by_status
);
criterion_main!(benches);
