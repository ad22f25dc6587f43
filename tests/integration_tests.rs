use jobring::{AddError, Job, MpmcQueue, SpmcQueue};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Increments a shared counter; the smallest useful job.
struct Count {
    counter: Arc<AtomicUsize>,
}

impl Job for Count {
    fn run(self) {
        self.counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Appends its value to a shared log, recording execution order.
struct Record {
    value: usize,
    log: Arc<Mutex<Vec<usize>>>,
}

impl Job for Record {
    fn run(self) {
        self.log.lock().unwrap().push(self.value);
    }
}

/// Flips its flag, panicking if some other execution got there first.
struct MarkOnce {
    index: usize,
    flags: Arc<Vec<AtomicBool>>,
}

impl Job for MarkOnce {
    fn run(self) {
        let again = self.flags[self.index].swap(true, Ordering::Relaxed);
        assert!(!again, "job {} executed twice", self.index);
    }
}

fn spawn_workers<const N: usize>(
    queue: &Arc<MpmcQueue<N>>,
    stop: &Arc<AtomicBool>,
    count: usize,
) -> Vec<thread::JoinHandle<()>> {
    (0..count)
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
        .collect()
}

#[test]
fn test_spmc_one_producer_four_consumers() {
    const TOTAL_JOBS: usize = 1000;

    let queue = Arc::new(SpmcQueue::<8>::new());
    let counter = Arc::new(AtomicUsize::new(0));
    let stop = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..4)
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

    let mut producer = queue.producer().unwrap();
    for _ in 0..TOTAL_JOBS {
        producer.add(Count {
            counter: counter.clone(),
        });
    }
    producer.wait_idle();

    assert_eq!(counter.load(Ordering::Relaxed), TOTAL_JOBS);
    assert_eq!(producer.active_count(), 0);

    stop.store(true, Ordering::Relaxed);
    for w in workers {
        w.join().unwrap();
    }
}

#[test]
fn test_spmc_single_consumer_preserves_submission_order() {
    const TOTAL_JOBS: usize = 500;

    let queue = Arc::new(SpmcQueue::<16>::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let stop = Arc::new(AtomicBool::new(false));

    let q = queue.clone();
    let stop2 = stop.clone();
    let consumer = thread::spawn(move || {
        while !stop2.load(Ordering::Relaxed) {
            if !q.run_next() {
                std::hint::spin_loop();
            }
        }
        while q.run_next() {}
    });

    let mut producer = queue.producer().unwrap();
    for value in 0..TOTAL_JOBS {
        producer.add(Record {
            value,
            log: log.clone(),
        });
    }
    producer.wait_idle();

    stop.store(true, Ordering::Relaxed);
    consumer.join().unwrap();

    assert_eq!(*log.lock().unwrap(), (0..TOTAL_JOBS).collect::<Vec<_>>());
}

#[test]
fn test_spmc_full_queue_rejects() {
    let queue = SpmcQueue::<2>::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let mut producer = queue.producer().unwrap();

    for _ in 0..2 {
        assert!(producer
            .try_add(Count {
                counter: counter.clone(),
            })
            .is_ok());
    }
    assert!(matches!(
        producer.try_add(Count {
            counter: counter.clone(),
        }),
        Err(AddError(_))
    ));
}

#[test]
fn test_empty_queue_rejects() {
    let queue = MpmcQueue::<4>::new();
    assert!(!queue.run_next());
    assert_eq!(queue.active_count(), 0);
}

#[test]
fn test_mpmc_four_producers_four_consumers() {
    const PRODUCERS: usize = 4;
    const JOBS_PER_PRODUCER: usize = 2500;
    const TOTAL_JOBS: usize = PRODUCERS * JOBS_PER_PRODUCER;

    let queue = Arc::new(MpmcQueue::<256>::new());
    let flags: Arc<Vec<AtomicBool>> =
        Arc::new((0..TOTAL_JOBS).map(|_| AtomicBool::new(false)).collect());
    let stop = Arc::new(AtomicBool::new(false));

    let workers = spawn_workers(&queue, &stop, 4);

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = queue.clone();
            let flags = flags.clone();
            thread::spawn(move || {
                for j in 0..JOBS_PER_PRODUCER {
                    q.add(MarkOnce {
                        index: p * JOBS_PER_PRODUCER + j,
                        flags: flags.clone(),
                    });
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    queue.wait_idle();

    stop.store(true, Ordering::Relaxed);
    for w in workers {
        w.join().unwrap();
    }

    assert_eq!(queue.active_count(), 0);
    let executed = flags.iter().filter(|f| f.load(Ordering::Relaxed)).count();
    assert_eq!(executed, TOTAL_JOBS);
}

#[test]
fn test_mpmc_contending_producers_stay_ordered() {
    const PRODUCERS: usize = 2;
    const JOBS_PER_PRODUCER: usize = 1000;

    let queue = Arc::new(MpmcQueue::<8>::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let stop = Arc::new(AtomicBool::new(false));

    // A single consumer executes in ring-position order, so each
    // producer's jobs must surface in its own submission order.
    let q = queue.clone();
    let stop2 = stop.clone();
    let consumer = thread::spawn(move || {
        while !stop2.load(Ordering::Relaxed) {
            if !q.run_next() {
                std::hint::spin_loop();
            }
        }
        while q.run_next() {}
    });

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let q = queue.clone();
            let log = log.clone();
            thread::spawn(move || {
                for j in 0..JOBS_PER_PRODUCER {
                    q.add(Record {
                        value: p * JOBS_PER_PRODUCER + j,
                        log: log.clone(),
                    });
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    queue.wait_idle();
    stop.store(true, Ordering::Relaxed);
    consumer.join().unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.len(), PRODUCERS * JOBS_PER_PRODUCER);
    for p in 0..PRODUCERS {
        let lo = p * JOBS_PER_PRODUCER;
        let hi = lo + JOBS_PER_PRODUCER;
        let own: Vec<_> = log.iter().copied().filter(|v| (lo..hi).contains(v)).collect();
        assert_eq!(own, (lo..hi).collect::<Vec<_>>(), "producer {p} reordered");
    }
}

#[test]
fn test_mpmc_drop_releases_pending_jobs() {
    struct Tracked {
        runs: Arc<AtomicUsize>,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    impl Job for Tracked {
        fn run(self) {
            self.runs.fetch_add(1, Ordering::Relaxed);
        }
    }

    let runs = Arc::new(AtomicUsize::new(0));
    let drops = Arc::new(AtomicUsize::new(0));

    {
        let queue = MpmcQueue::<8>::new();
        for _ in 0..5 {
            queue.add(Tracked {
                runs: runs.clone(),
                drops: drops.clone(),
            });
        }
        assert!(queue.run_next());
        assert!(queue.run_next());
    }

    assert_eq!(runs.load(Ordering::Relaxed), 2);
    // Two destroyed after running, three destroyed by queue teardown.
    assert_eq!(drops.load(Ordering::Relaxed), 5);
}

#[test]
fn test_mpmc_alternating_add_run() {
    let queue = MpmcQueue::<4>::new();
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..100 {
        queue.add(Count {
            counter: counter.clone(),
        });
        assert!(queue.run_next());
        assert_eq!(counter.load(Ordering::Relaxed), i + 1);
    }
    assert_eq!(queue.active_count(), 0);
}

#[test]
fn test_mpmc_rapid_add_run_stress() {
    const TOTAL_JOBS: usize = 10_000;

    let queue = Arc::new(MpmcQueue::<64>::new());
    let counter = Arc::new(AtomicUsize::new(0));

    let q = queue.clone();
    let c = counter.clone();
    let producer = thread::spawn(move || {
        for _ in 0..TOTAL_JOBS {
            q.add(Count { counter: c.clone() });
        }
    });

    let q = queue.clone();
    let c = counter.clone();
    let consumer = thread::spawn(move || {
        while c.load(Ordering::Relaxed) < TOTAL_JOBS {
            if !q.run_next() {
                std::hint::spin_loop();
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    queue.wait_idle();
    assert_eq!(counter.load(Ordering::Relaxed), TOTAL_JOBS);
}

#[test]
fn test_payload_capacity_boundary() {
    // Exactly PAYLOAD_BYTES once the Arc is counted; must still fit.
    struct Wide {
        _fill: [u8; jobring::PAYLOAD_BYTES - std::mem::size_of::<usize>()],
        counter: Arc<AtomicUsize>,
    }

    impl Job for Wide {
        fn run(self) {
            self.counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    let queue = MpmcQueue::<4>::new();
    let counter = Arc::new(AtomicUsize::new(0));
    queue.add(Wide {
        _fill: [0; jobring::PAYLOAD_BYTES - std::mem::size_of::<usize>()],
        counter: counter.clone(),
    });
    assert!(queue.run_next());
    assert_eq!(counter.load(Ordering::Relaxed), 1);
}

#[test]
fn test_capacity() {
    let spmc = SpmcQueue::<1024>::new();
    assert_eq!(spmc.capacity(), 1024);
    let mpmc = MpmcQueue::<16>::new();
    assert_eq!(mpmc.capacity(), 16);
}
