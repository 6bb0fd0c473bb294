use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::classify::classify;
use crate::config::PipelineConfig;
use crate::domain::{AccessionKey, ResultSet};
use crate::error::ResolverError;
use crate::pool::WorkerPool;
use crate::retry::Resolve;

/// Checkpoint emitted after every completed batch.
#[derive(Debug, Clone)]
pub struct BatchProgress {
    pub batch_index: usize,
    pub batch_count: usize,
    pub processed: usize,
    pub total: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub elapsed: Duration,
}

pub trait ProgressSink {
    fn batch_done(&self, progress: &BatchProgress);
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn batch_done(&self, _progress: &BatchProgress) {}
}

pub struct BatchScheduler {
    config: PipelineConfig,
    pool: WorkerPool,
}

impl BatchScheduler {
    /// Starts a pool of `config.pool_width` workers over `resolver`. The pool
    /// is reused for every batch and joined when the scheduler drops.
    pub fn new<R>(config: PipelineConfig, resolver: Arc<R>) -> Result<Self, ResolverError>
    where
        R: Resolve + 'static,
    {
        let pool = WorkerPool::new(config.pool_width, resolver)?;
        Ok(Self { config, pool })
    }

    /// Consecutive index ranges of at most `width` covering `0..len`.
    pub fn plan(len: usize, width: usize) -> Vec<Range<usize>> {
        if width == 0 {
            return Vec::new();
        }
        (0..len)
            .step_by(width)
            .map(|start| start..(start + width).min(len))
            .collect()
    }

    /// Resolves every key, one batch at a time. Each key yields exactly one
    /// record in either bucket.
    pub fn run(
        &self,
        keys: &[AccessionKey],
        sink: &dyn ProgressSink,
    ) -> Result<ResultSet, ResolverError> {
        let mut results = ResultSet::default();
        if keys.is_empty() {
            return Ok(results);
        }

        let started = Instant::now();
        let batches = Self::plan(keys.len(), self.config.pool_width.get());
        let batch_count = batches.len();
        for (batch_index, range) in batches.into_iter().enumerate() {
            let batch = &keys[range.clone()];
            let outcomes = self.pool.run_batch(batch)?;
            for (key, outcome) in batch.iter().zip(outcomes) {
                results.push(classify(key, outcome));
            }

            let progress = BatchProgress {
                batch_index,
                batch_count,
                processed: range.end,
                total: keys.len(),
                resolved: results.resolved.len(),
                unresolved: results.unresolved.len(),
                elapsed: started.elapsed(),
            };
            sink.batch_done(&progress);
        }

        info!(
            total = results.total(),
            resolved = results.resolved.len(),
            unresolved = results.unresolved.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resolution finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::{DisplayName, LookupOutcome};

    /// Resolves keys starting with `hit`, misses the rest.
    struct Prefix;

    impl Resolve for Prefix {
        fn resolve(&self, key: &AccessionKey) -> LookupOutcome {
            if key.as_str().starts_with("hit") {
                LookupOutcome::Resolved {
                    external_id: key.to_string(),
                    display_name: DisplayName::Unnamed,
                }
            } else {
                LookupOutcome::Miss
            }
        }
    }

    #[derive(Default)]
    struct Checkpoints(Mutex<Vec<(usize, usize, usize)>>);

    impl ProgressSink for Checkpoints {
        fn batch_done(&self, progress: &BatchProgress) {
            self.0
                .lock()
                .unwrap()
                .push((progress.batch_index, progress.processed, progress.resolved));
        }
    }

    fn keys(values: &[&str]) -> Vec<AccessionKey> {
        values.iter().map(|value| value.parse().unwrap()).collect()
    }

    #[test]
    fn plan_splits_with_remainder() {
        assert_eq!(BatchScheduler::plan(7, 3), vec![0..3, 3..6, 6..7]);
        assert_eq!(BatchScheduler::plan(6, 3), vec![0..3, 3..6]);
        assert_eq!(BatchScheduler::plan(2, 5), vec![0..2]);
        assert!(BatchScheduler::plan(0, 3).is_empty());
    }

    #[test]
    fn runs_every_batch_on_one_pool() {
        let config = PipelineConfig::new(3).unwrap();
        let scheduler = BatchScheduler::new(config, Arc::new(Prefix)).unwrap();
        let sink = Checkpoints::default();

        let input = keys(&["hit1", "a", "b", "hit2", "c", "d", "hit3"]);
        let results = scheduler.run(&input, &sink).unwrap();

        assert_eq!(results.total(), 7);
        assert_eq!(results.resolved.len(), 3);
        assert_eq!(
            *sink.0.lock().unwrap(),
            vec![(0, 3, 1), (1, 6, 2), (2, 7, 3)]
        );
    }

    #[test]
    fn pool_width_follows_config() {
        let config = PipelineConfig::new(2).unwrap();
        let scheduler = BatchScheduler::new(config, Arc::new(Prefix)).unwrap();
        assert_eq!(scheduler.pool.width().get(), 2);
    }
}
