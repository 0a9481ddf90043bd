use std::sync::Arc;
use std::time::Duration;

use keyway::ComputeFuture;
use keyway::MemoCache;
use keyway::MemoError;

use rand::Rng;

// Fails roughly half of the time, after a random delay.
fn flaky(key: u32) -> ComputeFuture<String, String> {
    Box::pin(async move {
        let num = rand::rng().random_range(100..300);
        tokio::time::sleep(Duration::from_millis(num)).await;
        if num % 2 == 0 {
            return Err(format!("key {key}: bad number {num}"));
        }
        Ok(format!("key {key}: computed in {num}ms"))
    })
}

#[derive(Debug, Default)]
struct Tally {
    ok: usize,
    failed: usize,
    other: usize,
}

/// Each round sends 20 concurrent callers at the same key.
///
/// A failure only reaches the caller whose computation failed. Everyone
/// waiting behind it retries, so a round reports as many failures as failed
/// computations, never a whole crowd of them. Once one computation succeeds,
/// later rounds are answered from the cache without computing.
#[tokio::main]
async fn main() {
    let cache = Arc::new(MemoCache::new(flaky));

    for round in 1..=5 {
        let computed_before = cache.computation_count();
        let hdls: Vec<_> = (0..20)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.get(7).await })
            })
            .collect();

        let mut tally = Tally::default();
        for hdl in hdls {
            match hdl.await {
                Ok(Ok(_)) => tally.ok += 1,
                Ok(Err(MemoError::Compute(reason))) => {
                    println!("  leader failed: {reason}");
                    tally.failed += 1;
                }
                Ok(Err(err)) => {
                    println!("  unexpected: {err}");
                    tally.other += 1;
                }
                Err(join) => {
                    println!("  task failed: {join}");
                    tally.other += 1;
                }
            }
        }

        let computed = cache.computation_count() - computed_before;
        println!("round {round}: {tally:?}, computations: {computed}");
    }
    println!("cached: {}", cache.contains_key(&7));
}
