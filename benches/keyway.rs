use std::convert::Infallible;

use keyway::ComputeFuture;
use keyway::DedupQueue;
use keyway::MemoCache;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use moka::future::Cache;
use rand::Rng;

// A deliberately slow computation, so that misses are expensive.
async fn slow_len(key: String) -> usize {
    tokio::time::sleep(tokio::time::Duration::from_micros(50)).await;
    key.len()
}

fn keys(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("key-{i}")).collect()
}

fn cache_get(c: &mut Criterion) {
    let compute = |key: String| -> ComputeFuture<usize, Infallible> {
        Box::pin(async move { Ok(slow_len(key).await) })
    };

    let mut group = c.benchmark_group("get");
    for size in [16, 256, 4096].iter() {
        let words = keys(*size);

        // Benchmark keyway
        let memo = MemoCache::new(compute);
        group.bench_with_input(BenchmarkId::new("keyway get", size), &words, |b, words| {
            b.to_async(tokio::runtime::Runtime::new().expect("build tokio runtime"))
                .iter(|| async {
                    let word = &words[rand::rng().random_range(0..words.len())];
                    let _ = memo.get(word.to_string()).await;
                })
        });
        eprintln!("keyway entries: {}", memo.len());

        // Benchmark moka
        let moka = Cache::new(*size as u64);
        group.bench_with_input(BenchmarkId::new("moka get", size), &words, |b, words| {
            b.to_async(tokio::runtime::Runtime::new().expect("build tokio runtime"))
                .iter(|| async {
                    let word = &words[rand::rng().random_range(0..words.len())];
                    let _ = moka
                        .get_with(word.to_string(), slow_len(word.to_string()))
                        .await;
                })
        });
        eprintln!("moka entries: {}", moka.entry_count());
    }
}

fn queue_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    for size in [16, 256, 4096].iter() {
        let words = keys(*size);
        group.bench_with_input(
            BenchmarkId::new("offer, peek, remove", size),
            &words,
            |b, words| {
                let queue = DedupQueue::new(String::clone);
                b.iter(|| {
                    for word in words {
                        queue.offer(word.clone());
                    }
                    while let Some(word) = queue.try_take() {
                        queue.remove(&word);
                    }
                })
            },
        );
    }
}

criterion_group!(benches, cache_get, queue_cycle);
criterion_main!(benches);
