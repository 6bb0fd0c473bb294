use serde::Deserialize;
use tracing::debug;

use crate::domain::{AccessionKey, LookupOutcome};
use crate::uniprot::LookupClient;

/// What to do on a miss when the key carries no version separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetryMode {
    /// Retry with the identical key (a second, redundant request).
    #[default]
    SameKey,
    /// Skip the retry when stripping the version would not change the key.
    SkipUnversioned,
}

/// Resolves one key to a final outcome. Implemented by [`RetryPolicy`] and
/// shared with the worker pool.
pub trait Resolve: Send + Sync {
    fn resolve(&self, key: &AccessionKey) -> LookupOutcome;
}

pub struct RetryPolicy<C: LookupClient> {
    client: C,
    mode: RetryMode,
}

impl<C: LookupClient> RetryPolicy<C> {
    pub fn new(client: C, mode: RetryMode) -> Self {
        Self { client, mode }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

impl<C: LookupClient> Resolve for RetryPolicy<C> {
    fn resolve(&self, key: &AccessionKey) -> LookupOutcome {
        let outcome = self.client.lookup(key);
        if !outcome.is_miss() {
            return outcome;
        }

        let fallback = key.strip_version();
        if fallback == *key && self.mode == RetryMode::SkipUnversioned {
            debug!(key = %key, "miss on unversioned key; retry skipped");
            return outcome;
        }
        debug!(key = %key, fallback = %fallback, "miss; retrying without version");
        self.client.lookup(&fallback)
    }
}
