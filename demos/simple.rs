//! Simple usage example

use jobring::{Job, MpmcQueue};
use std::sync::Arc;
use std::thread;

/// A job that greets from whichever worker claims it.
struct Greet {
    id: usize,
}

impl Job for Greet {
    fn run(self) {
        println!("Running job {}", self.id);
    }
}

fn main() {
    println!("jobring - Simple Example\n");

    // Create a queue with 16 slots
    let queue = Arc::new(MpmcQueue::<16>::new());

    // Worker thread draining the queue
    let worker_queue = queue.clone();
    let worker = thread::spawn(move || {
        let mut done = 0;
        while done < 10 {
            if worker_queue.run_next() {
                done += 1;
            } else {
                std::hint::spin_loop();
            }
        }
        println!("Worker finished!");
    });

    // Submit from the main thread
    for id in 0..10 {
        println!("Submitting job {}", id);
        queue.add(Greet { id });

        // Small delay to make output readable
        thread::sleep(std::time::Duration::from_millis(100));
    }

    // Block until every job has run
    queue.wait_idle();
    worker.join().unwrap();

    println!("\nExample completed successfully!");
}
