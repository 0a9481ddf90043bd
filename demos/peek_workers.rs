use std::sync::Arc;
use std::time::Duration;

use keyway::DedupQueue;

use rand::Rng;

#[derive(Clone, Debug, PartialEq)]
struct Job {
    id: u32,
    revision: u32,
}

/// A producer keeps offering jobs, sometimes re-offering an id that is
/// still queued with a newer revision. Several workers wait for the next
/// job, and the first one to remove it gets to process it. Because taking
/// is a peek, every idle worker sees the same job and only the removal
/// decides who owns it. Workers claim with `remove_matching`, so a revision
/// offered after the peek is left queued instead of being dropped unseen.
#[tokio::main]
async fn main() {
    let queue = Arc::new(DedupQueue::new(|job: &Job| job.id));

    let mut workers = vec![];
    for worker in 0..4 {
        let queue = queue.clone();
        workers.push(tokio::spawn(async move {
            let mut done = 0;
            while let Some(job) = queue.poll(Duration::from_millis(500)).await {
                if !queue.remove_matching(&job) {
                    // Another worker claimed it first, or a newer revision replaced it.
                    continue;
                }
                println!("worker {worker}: job {} at revision {}", job.id, job.revision);
                tokio::time::sleep(Duration::from_millis(20)).await;
                done += 1;
            }
            done
        }));
    }

    for revision in 0..3 {
        for id in 0..10 {
            queue.offer(Job { id, revision });
            let pause = rand::rng().random_range(1..5);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    }

    let mut total = 0;
    for worker in workers {
        total += worker.await.unwrap();
    }
    println!("processed: {total}, left over: {}", queue.size());
}
