//! Performance benchmarks for the path store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use tempfile::TempDir;
use todobro::{
    JsonFileBackend, KvBackend, PathStore, SetOptions, StateChange, SubscribeOptions, TaskInput,
    TodoList,
};

fn seeded_store(sections: usize) -> PathStore {
    let mut doc = serde_json::Map::new();
    for i in 0..sections {
        doc.insert(
            format!("section{i}"),
            json!({"nested": {"value": i, "label": format!("item {i}")}}),
        );
    }
    PathStore::with_initial(Value::Object(doc)).unwrap()
}

/// Benchmark path reads at varying depth
fn bench_get(c: &mut Criterion) {
    let store = seeded_store(100);

    c.bench_function("get_nested", |b| {
        b.iter(|| black_box(store.get("section50.nested.value")));
    });

    c.bench_function("get_missing", |b| {
        b.iter(|| black_box(store.get("section50.nested.absent.leaf")));
    });
}

/// Benchmark writes, changed and no-op
fn bench_set(c: &mut Criterion) {
    let store = seeded_store(100);

    c.bench_function("set_changed", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            store.set("section50.nested.value", i, SetOptions::default())
        });
    });

    c.bench_function("set_noop", |b| {
        store.set("section10.nested.value", 7, SetOptions::default());
        b.iter(|| store.set("section10.nested.value", 7, SetOptions::default()));
    });
}

/// Benchmark notification fan-out with varying subscriber counts
fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for subscribers in [1, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let store = PathStore::new();
                for i in 0..count {
                    // Half match the written path, half watch a sibling.
                    let prefix = if i % 2 == 0 { "date" } else { "time" };
                    store.subscribe(
                        prefix,
                        |change: &StateChange| {
                            black_box(change);
                            Ok(())
                        },
                        SubscribeOptions::default(),
                    );
                }

                let mut n = 0u64;
                b.iter(|| {
                    n += 1;
                    store.set("date.selectedDate", n, SetOptions::default())
                });
            },
        );
    }

    group.finish();
}

/// Benchmark batched updates against the same writes done one by one
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");

    for batch in [4, 16, 64] {
        group.bench_with_input(BenchmarkId::new("batched", batch), &batch, |b, &size| {
            let store = PathStore::new();
            store.subscribe("form", |_: &StateChange| Ok(()), SubscribeOptions::default());
            let mut round = 0u64;
            b.iter(|| {
                round += 1;
                let updates: Vec<(String, Value)> = (0..size)
                    .map(|i| (format!("form.field{i}"), json!(round)))
                    .collect();
                store.update(updates, SetOptions::default());
            });
        });

        group.bench_with_input(BenchmarkId::new("sequential", batch), &batch, |b, &size| {
            let store = PathStore::new();
            store.subscribe("form", |_: &StateChange| Ok(()), SubscribeOptions::default());
            let mut round = 0u64;
            b.iter(|| {
                round += 1;
                for i in 0..size {
                    store.set(&format!("form.field{i}"), round, SetOptions::default());
                }
            });
        });
    }

    group.finish();
}

/// Benchmark persisting the to-do list with varying list sizes
fn bench_todo_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("todo_save");
    group.sample_size(20);

    for existing in [10, 100, 500] {
        group.bench_with_input(
            BenchmarkId::new("existing_items", existing),
            &existing,
            |b, &count| {
                let dir = TempDir::new().unwrap();
                let backend = JsonFileBackend::open(dir.path()).unwrap();
                let mut todos = TodoList::load(backend).unwrap();
                for i in 0..count {
                    todos
                        .add_task(TaskInput {
                            text: format!("task {i}"),
                            ..Default::default()
                        })
                        .unwrap();
                }

                b.iter(|| {
                    let value = serde_json::to_value(todos.items()).unwrap();
                    todos.backend().save("bench", &value).unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_get,
    bench_set,
    bench_fan_out,
    bench_update,
    bench_todo_save
);
criterion_main!(benches);
