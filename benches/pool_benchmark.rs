use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tinyserver::pool::ThreadPool;
use tinyserver::queue::TaskQueue;

fn queue_round_trip_benchmark(c: &mut Criterion) {
    c.bench_function("task_queue_enqueue_dequeue", |b| {
        b.iter(|| {
            let mut queue = TaskQueue::new();
            for i in 0..1000 {
                queue.enqueue(black_box(i));
            }
            while let Some(item) = queue.dequeue() {
                black_box(item);
            }
        });
    });
}

fn pool_throughput_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_throughput");

    for workers in [1usize, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(workers), workers, |b, &workers| {
            let pool = ThreadPool::new(workers).unwrap();
            let counter = Arc::new(AtomicUsize::new(0));

            b.iter(|| {
                for _ in 0..1000 {
                    let counter = Arc::clone(&counter);
                    pool.add_task(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    });
                }
                pool.wait();
            });
        });
    }

    group.finish();
}

fn pool_creation_benchmark(c: &mut Criterion) {
    c.bench_function("pool_create_destroy_8", |b| {
        b.iter(|| {
            let pool = ThreadPool::new(black_box(8)).unwrap();
            pool.destroy();
        });
    });
}

criterion_group!(
    benches,
    queue_round_trip_benchmark,
    pool_throughput_benchmark,
    pool_creation_benchmark
);
criterion_main!(benches);
