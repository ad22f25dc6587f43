//! Stress harness: floods the queue from N producers while M consumers
//! drain it, then reports verified throughput.
//!
//! Usage: stress [producers] [consumers] [jobs]

use jobring::{Job, MpmcQueue};
use std::env;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Arithmetic-heavy job: a hash-like loop over its payload, then a tick
/// on the shared completion counter.
struct HashJob {
    payload: u64,
    completed: Arc<AtomicU64>,
}

impl Job for HashJob {
    fn run(self) {
        let mut val = self.payload;
        for i in 0..1000u64 {
            val = (val << 5).wrapping_add(val).wrapping_add(i);
        }
        std::hint::black_box(val);
        self.completed.fetch_add(1, Ordering::Relaxed);
    }
}

fn run_stress(num_producers: usize, num_consumers: usize, total_jobs: usize) {
    let queue = Arc::new(MpmcQueue::<256>::new());
    let completed = Arc::new(AtomicU64::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let consumers: Vec<_> = (0..num_consumers)
        .map(|_| {
            let q = queue.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if !q.run_next() {
                        std::hint::spin_loop();
                    }
                }
                while q.run_next() {}
            })
        })
        .collect();

    let start = Instant::now();

    let jobs_per_producer = total_jobs / num_producers;
    let producers: Vec<_> = (0..num_producers)
        .map(|_| {
            let q = queue.clone();
            let completed = completed.clone();
            thread::spawn(move || {
                for j in 0..jobs_per_producer {
                    q.add(HashJob {
                        payload: j as u64,
                        completed: completed.clone(),
                    });
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    queue.wait_idle();

    let elapsed = start.elapsed();

    stop.store(true, Ordering::Relaxed);
    for c in consumers {
        c.join().unwrap();
    }

    let total = (jobs_per_producer * num_producers) as f64;
    println!("Results for {}P / {}C:", num_producers, num_consumers);
    println!("      Time: {:.4} s", elapsed.as_secs_f64());
    println!("Throughput: {:.0} jobs/sec", total / elapsed.as_secs_f64());
    println!(
        "  Verified: {} / {}",
        completed.load(Ordering::Relaxed),
        total as u64
    );
}

fn main() {
    let mut args = env::args().skip(1);
    let producers = args.next().and_then(|a| a.parse().ok()).unwrap_or(1);
    let consumers = args.next().and_then(|a| a.parse().ok()).unwrap_or(1);
    let jobs = args.next().and_then(|a| a.parse().ok()).unwrap_or(10_000);

    println!("Producers: {}", producers);
    println!("Consumers: {}", consumers);
    println!("     Jobs: {}\n", jobs);

    run_stress(producers, consumers, jobs);
}
