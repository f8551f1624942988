//! Throughput Benchmark for session-file-store
//!
//! This benchmark measures the performance of the record store
//! under various workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use session_file_store::{reap, RecordStore, Session, StoreConfig};
use tempfile::TempDir;
use tokio::runtime::Runtime;

fn store(dir: &TempDir, secret: Option<&str>) -> RecordStore {
    let mut config = StoreConfig::new()
        .with_path(dir.path())
        .without_reaping()
        .with_logging(false);
    if let Some(secret) = secret {
        config = config.with_secret(secret);
    }
    RecordStore::new(config.resolve().unwrap())
}

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let plain = store(&dir, None);
    let encrypted = store(&dir, Some("bench-secret"));

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let mut session = Session::new().with("views", i);
            rt.block_on(plain.set(&format!("s{}", i % 1000), &mut session))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_large", |b| {
        let mut i = 0u64;
        let payload = "x".repeat(64 * 1024); // 64KB value
        b.iter(|| {
            let mut session = Session::new().with("blob", payload.as_str());
            rt.block_on(plain.set(&format!("l{}", i % 100), &mut session))
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("set_encrypted", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let mut session = Session::new().with("views", i);
            rt.block_on(encrypted.set(&format!("e{}", i % 1000), &mut session))
                .unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let store = store(&dir, None);

    // Pre-populate with data
    rt.block_on(async {
        for i in 0..1000 {
            let mut session = Session::new().with("views", i);
            store.set(&format!("s{}", i), &mut session).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            black_box(rt.block_on(store.get(&format!("s{}", i % 1000))).unwrap());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark a reap pass over a directory of live sessions
fn bench_reap(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let store = store(&dir, None);

    rt.block_on(async {
        for i in 0..500 {
            store.set(&format!("s{}", i), &mut Session::new()).await.unwrap();
        }
    });

    let mut group = c.benchmark_group("reap");
    group.throughput(Throughput::Elements(500));
    group.sample_size(20);

    group.bench_function("reap_500_live", |b| {
        b.iter(|| black_box(rt.block_on(reap(&store)).unwrap()));
    });

    group.finish();
}

criterion_group!(benches, bench_set, bench_get, bench_reap);
criterion_main!(benches);
