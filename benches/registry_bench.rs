//! Benchmarks for the dependency registry

use cellwire::{Position, Registry, WeakHandle};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

trait RowView: Send + Sync {}

struct RowCell;

impl RowView for RowCell {}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("value_small", |b| {
        b.iter(|| {
            let registry = Registry::new();
            registry.register(SmallService { value: 42 });
            black_box(registry)
        })
    });

    group.bench_function("value_medium", |b| {
        b.iter(|| {
            let registry = Registry::new();
            registry.register(MediumService {
                name: "test".to_string(),
                values: vec![1, 2, 3, 4, 5],
            });
            black_box(registry)
        })
    });

    group.bench_function("single", |b| {
        b.iter(|| {
            let registry = Registry::new();
            registry.register_single(|| Arc::new(SmallService { value: 42 }));
            black_box(registry)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    let registry = Registry::new();
    registry.register(SmallService { value: 42 });
    group.bench_function("value", |b| b.iter(|| black_box(registry.resolve::<SmallService>())));

    let registry = Registry::new();
    registry.register_for("detail", SmallService { value: 42 });
    group.bench_function("value_for_identifier", |b| {
        b.iter(|| black_box(registry.resolve_for::<SmallService>("detail")))
    });

    let registry = Registry::new();
    registry.register_factory(|| Arc::new(SmallService { value: 42 }));
    group.bench_function("transient", |b| b.iter(|| black_box(registry.resolve::<SmallService>())));

    let registry = Registry::new();
    registry.register_single(|| Arc::new(SmallService { value: 42 }));
    group.bench_function("single_cached", |b| {
        b.iter(|| black_box(registry.resolve::<SmallService>()))
    });

    group.finish();
}

fn bench_proxy(c: &mut Criterion) {
    let mut group = c.benchmark_group("proxy");

    let registry = Registry::new();
    let proxy = registry.create_proxy::<RowCell>(true);
    let cell = Arc::new(RowCell);
    registry.notify_ready(&cell);

    group.bench_function("execute_while_bound", |b| {
        b.iter(|| {
            proxy.execute_or_postpone(|| {
                black_box(());
            })
        })
    });

    group.finish();
}

fn bench_weak_handle(c: &mut Criterion) {
    let mut group = c.benchmark_group("weak_handle");

    let view: Arc<dyn RowView> = Arc::new(RowCell);
    let handle = WeakHandle::bound(&view);

    group.bench_function("upgrade", |b| b.iter(|| black_box(handle.get().is_some())));

    group.finish();
}

fn bench_position_identity(c: &mut Criterion) {
    c.bench_function("position_display", |b| {
        b.iter(|| black_box(Position::new(3, 1).to_string()))
    });
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_proxy,
    bench_weak_handle,
    bench_position_identity
);
criterion_main!(benches);
