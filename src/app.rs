use std::sync::Arc;
use std::time::Instant;

use camino::Utf8Path;
use serde::Serialize;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::{AccessionKey, ResultSet};
use crate::error::ResolverError;
use crate::input;
use crate::output::{self, OutputMode};
use crate::retry::RetryPolicy;
use crate::scheduler::{BatchScheduler, ProgressSink};
use crate::uniprot::LookupClient;

/// Asked once per destination that already exists.
pub trait OverwritePrompt {
    fn confirm_overwrite(&self, path: &Utf8Path) -> Result<bool, ResolverError>;
}

/// Declines every overwrite. Used where nobody can be asked.
pub struct NeverOverwrite;

impl OverwritePrompt for NeverOverwrite {
    fn confirm_overwrite(&self, _path: &Utf8Path) -> Result<bool, ResolverError> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub input: String,
    pub rows_read: usize,
    pub rows_blank: usize,
    pub rows_sampled_out: usize,
    pub rows_without_accession: usize,
    pub keys: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub resolved_path: String,
    pub unresolved_path: String,
    pub elapsed_secs: f64,
    pub finished_at: String,
}

pub struct App<C: LookupClient + 'static> {
    config: ResolvedConfig,
    policy: Arc<RetryPolicy<C>>,
}

impl<C: LookupClient + 'static> App<C> {
    pub fn new(config: ResolvedConfig, client: C) -> Self {
        let policy = Arc::new(RetryPolicy::new(client, config.pipeline.retry_mode));
        Self { config, policy }
    }

    /// Refuses to continue when a destination exists, unless forced or the
    /// prompt agrees for every such file.
    pub fn guard_outputs(
        &self,
        mode: OutputMode,
        prompt: &dyn OverwritePrompt,
    ) -> Result<(), ResolverError> {
        let targets = &self.config.output;
        if targets.force {
            return Ok(());
        }
        let existing = output::existing_outputs(&[
            targets.resolved_path.as_path(),
            targets.unresolved_path.as_path(),
        ]);
        for path in existing {
            if mode == OutputMode::NonInteractive {
                return Err(ResolverError::OutputExists(path.to_string()));
            }
            if !prompt.confirm_overwrite(path)? {
                return Err(ResolverError::Aborted);
            }
        }
        Ok(())
    }

    pub fn resolve(
        &self,
        keys: &[AccessionKey],
        sink: &dyn ProgressSink,
    ) -> Result<ResultSet, ResolverError> {
        let scheduler = BatchScheduler::new(self.config.pipeline, Arc::clone(&self.policy))?;
        scheduler.run(keys, sink)
    }

    pub fn run(
        &self,
        mode: OutputMode,
        prompt: &dyn OverwritePrompt,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, ResolverError> {
        let started = Instant::now();
        self.guard_outputs(mode, prompt)?;

        let loaded = input::load_keys(&self.config.input)?;
        info!(
            path = %self.config.input.path,
            keys = loaded.keys.len(),
            width = self.config.pipeline.pool_width.get(),
            "resolving accessions"
        );
        let results = self.resolve(&loaded.keys, sink)?;

        let targets = &self.config.output;
        output::write_records(&targets.resolved_path, &results.resolved)?;
        output::write_records(&targets.unresolved_path, &results.unresolved)?;

        Ok(RunSummary {
            input: self.config.input.path.to_string(),
            rows_read: loaded.rows_read,
            rows_blank: loaded.rows_blank,
            rows_sampled_out: loaded.rows_sampled_out,
            rows_without_accession: loaded.rows_without_accession,
            keys: loaded.keys.len(),
            resolved: results.resolved.len(),
            unresolved: results.unresolved.len(),
            resolved_path: targets.resolved_path.to_string(),
            unresolved_path: targets.unresolved_path.to_string(),
            elapsed_secs: (started.elapsed().as_secs_f64() * 10.0).round() / 10.0,
            finished_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
