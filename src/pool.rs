use std::cell::Cell;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::domain::{AccessionKey, LookupOutcome};
use crate::error::ResolverError;
use crate::retry::Resolve;

struct Job {
    generation: u64,
    index: usize,
    key: AccessionKey,
}

struct Done {
    generation: u64,
    index: usize,
    outcome: Result<LookupOutcome, String>,
}

/// Fixed set of worker threads that lives for the whole run. Each batch is
/// fanned out over a shared job channel and fanned back in by index.
pub struct WorkerPool {
    width: NonZeroUsize,
    jobs: Option<Sender<Job>>,
    done: Receiver<Done>,
    workers: Vec<JoinHandle<()>>,
    generation: Cell<u64>,
}

impl WorkerPool {
    pub fn new<R>(width: NonZeroUsize, resolver: Arc<R>) -> Result<Self, ResolverError>
    where
        R: Resolve + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel::<Done>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = Vec::with_capacity(width.get());
        for worker_id in 0..width.get() {
            let job_rx = Arc::clone(&job_rx);
            let done_tx = done_tx.clone();
            let resolver = Arc::clone(&resolver);
            let handle = thread::Builder::new()
                .name(format!("lookup-worker-{worker_id}"))
                .spawn(move || worker_loop(job_rx, done_tx, resolver))
                .map_err(|err| ResolverError::WorkerLost(format!("spawn failed: {err}")))?;
            workers.push(handle);
        }
        debug!(width = width.get(), "worker pool started");

        Ok(Self {
            width,
            jobs: Some(job_tx),
            done: done_rx,
            workers,
            generation: Cell::new(0),
        })
    }

    pub fn width(&self) -> NonZeroUsize {
        self.width
    }

    /// Resolves every key concurrently and returns outcomes in submission
    /// order. Blocks until the whole batch has reported. A lookup that
    /// panics yields `Miss` for its key.
    pub fn run_batch(&self, keys: &[AccessionKey]) -> Result<Vec<LookupOutcome>, ResolverError> {
        if keys.len() > self.width.get() {
            return Err(ResolverError::BatchTooLarge {
                len: keys.len(),
                width: self.width.get(),
            });
        }
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| ResolverError::WorkerLost("pool is shut down".to_string()))?;

        let generation = self.generation.get() + 1;
        self.generation.set(generation);

        for (index, key) in keys.iter().enumerate() {
            jobs.send(Job {
                generation,
                index,
                key: key.clone(),
            })
            .map_err(|_| ResolverError::WorkerLost("all workers exited".to_string()))?;
        }

        let mut slots: Vec<Option<LookupOutcome>> = (0..keys.len()).map(|_| None).collect();
        let mut pending = keys.len();
        while pending > 0 {
            let done = self
                .done
                .recv()
                .map_err(|_| ResolverError::WorkerLost("result channel closed".to_string()))?;
            // leftovers from an aborted earlier batch
            if done.generation != generation {
                continue;
            }
            let outcome = done.outcome.unwrap_or_else(|message| {
                error!(key = %keys[done.index], %message, "lookup panicked; recording as miss");
                LookupOutcome::Miss
            });
            slots[done.index] = Some(outcome);
            pending -= 1;
        }

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ResolverError::WorkerLost("duplicate result index".to_string()))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("lookup worker terminated abnormally");
            }
        }
    }
}

fn worker_loop<R: Resolve>(jobs: Arc<Mutex<Receiver<Job>>>, done: Sender<Done>, resolver: Arc<R>) {
    loop {
        let job = match jobs.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(job) = job else {
            break;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| resolver.resolve(&job.key)))
            .map_err(|payload| panic_message(payload.as_ref()));
        let reply = Done {
            generation: job.generation,
            index: job.index,
            outcome,
        };
        if done.send(reply).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Condvar;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::DisplayName;

    /// Sleeps longer for earlier keys so completions arrive reversed.
    struct Reversing {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Resolve for Reversing {
        fn resolve(&self, key: &AccessionKey) -> LookupOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let rank: u64 = key.as_str().trim_start_matches('K').parse().unwrap();
            thread::sleep(Duration::from_millis(60 - rank * 15));
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            LookupOutcome::Resolved {
                external_id: key.to_string(),
                display_name: DisplayName::Unnamed,
            }
        }
    }

    struct Panicky;

    impl Resolve for Panicky {
        fn resolve(&self, key: &AccessionKey) -> LookupOutcome {
            if key.as_str() == "BOOM" {
                panic!("lookup exploded");
            }
            LookupOutcome::Resolved {
                external_id: key.to_string(),
                display_name: DisplayName::Unnamed,
            }
        }
    }

    /// Holds every caller until `width` lookups are in flight together, or
    /// until the deadline passes.
    struct Gate {
        width: usize,
        arrived: Mutex<usize>,
        all_in: Condvar,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Gate {
        fn new(width: usize) -> Self {
            Self {
                width,
                arrived: Mutex::new(0),
                all_in: Condvar::new(),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    impl Resolve for Gate {
        fn resolve(&self, _key: &AccessionKey) -> LookupOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            {
                let mut arrived = self.arrived.lock().unwrap();
                *arrived += 1;
                self.all_in.notify_all();
                let _ = self
                    .all_in
                    .wait_timeout_while(arrived, Duration::from_secs(5), |n| *n < self.width)
                    .unwrap();
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            LookupOutcome::Miss
        }
    }

    fn keys(values: &[&str]) -> Vec<AccessionKey> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn results_come_back_in_submission_order() {
        let resolver = Arc::new(Reversing {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let pool = WorkerPool::new(NonZeroUsize::new(4).unwrap(), Arc::clone(&resolver)).unwrap();
        let batch = keys(&["K0", "K1", "K2", "K3"]);
        let outcomes = pool.run_batch(&batch).unwrap();
        let ids = outcomes
            .iter()
            .map(|outcome| match outcome {
                LookupOutcome::Resolved { external_id, .. } => external_id.as_str(),
                LookupOutcome::Miss => "miss",
            })
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["K0", "K1", "K2", "K3"]);
        assert!(resolver.peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn oversize_batch_is_rejected() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap(), Arc::new(Panicky)).unwrap();
        let err = pool.run_batch(&keys(&["A", "B", "C"])).unwrap_err();
        assert_matches!(err, ResolverError::BatchTooLarge { len: 3, width: 2 });
    }

    #[test]
    fn whole_batch_runs_at_once() {
        let gate = Arc::new(Gate::new(3));
        let pool = WorkerPool::new(NonZeroUsize::new(3).unwrap(), Arc::clone(&gate)).unwrap();
        let outcomes = pool.run_batch(&keys(&["A", "B", "C"])).unwrap();
        assert_eq!(outcomes.len(), 3);
        assert_eq!(gate.peak.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_lookup_becomes_miss_and_pool_survives() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap(), Arc::new(Panicky)).unwrap();
        let outcomes = pool.run_batch(&keys(&["BOOM", "OK"])).unwrap();
        assert_eq!(
            outcomes,
            vec![
                LookupOutcome::Miss,
                LookupOutcome::Resolved {
                    external_id: "OK".to_string(),
                    display_name: DisplayName::Unnamed,
                },
            ]
        );

        let outcomes = pool.run_batch(&keys(&["A", "BOOM"])).unwrap();
        assert!(!outcomes[0].is_miss());
        assert!(outcomes[1].is_miss());
    }

    #[test]
    fn empty_batch_returns_nothing() {
        let pool = WorkerPool::new(NonZeroUsize::new(1).unwrap(), Arc::new(Panicky)).unwrap();
        assert!(pool.run_batch(&[]).unwrap().is_empty());
    }
}
