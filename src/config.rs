use std::fs;
use std::num::NonZeroUsize;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

use crate::error::ResolverError;
use crate::retry::RetryMode;

pub const DEFAULT_CONFIG_FILE: &str = "acc-resolve.json";
pub const DEFAULT_INPUT: &str = "../in_files/bulk_rna_seq.tsv";
pub const DEFAULT_RESOLVED_OUTPUT: &str = "out_files/id_dump.csv";
pub const DEFAULT_UNRESOLVED_OUTPUT: &str = "out_files/error_log.csv";
pub const DEFAULT_DESCRIPTION_COLUMN: &str = "Nr Description";
pub const DEFAULT_BASE_URL: &str = "https://www.uniprot.org/uniprot/";

/// On-disk config. Every field is optional; missing ones fall back to
/// defaults and may be overridden from the command line.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub verbose: Option<bool>,
    #[serde(default)]
    pub retry: Option<RetryMode>,
    #[serde(default)]
    pub service: Option<ServiceEntry>,
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub description_column: Option<String>,
    #[serde(default)]
    pub sample: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceEntry {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub columns: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub threads: Option<usize>,
    pub verbose: bool,
    pub skip_unversioned_retry: bool,
    pub input: Option<String>,
    pub description_column: Option<String>,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineConfig {
    pub pool_width: NonZeroUsize,
    pub verbose: bool,
    pub retry_mode: RetryMode,
}

impl PipelineConfig {
    pub fn new(pool_width: usize) -> Result<Self, ResolverError> {
        Ok(Self {
            pool_width: NonZeroUsize::new(pool_width)
                .ok_or(ResolverError::InvalidPoolWidth(pool_width))?,
            verbose: false,
            retry_mode: RetryMode::default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub columns: String,
    pub format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            columns: "id,genes".to_string(),
            format: "tab".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputConfig {
    pub path: Utf8PathBuf,
    pub description_column: String,
    pub sample: Option<usize>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub resolved_path: Utf8PathBuf,
    pub unresolved_path: Utf8PathBuf,
    pub force: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub pipeline: PipelineConfig,
    pub service: ServiceConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `acc-resolve.json` when present, then applies
    /// overrides. An explicit path that cannot be read is an error; a
    /// missing default file is not.
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, ResolverError> {
        let config = match path {
            Some(path) => Self::read(Utf8Path::new(path))?,
            None if Utf8Path::new(DEFAULT_CONFIG_FILE).as_std_path().exists() => {
                Self::read(Utf8Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Config::default(),
        };
        Self::resolve_config(config, overrides)
    }

    fn read(path: &Utf8Path) -> Result<Config, ResolverError> {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|_| ResolverError::ConfigRead(path.to_string()))?;
        serde_json::from_str(&content).map_err(|err| ResolverError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, ResolverError> {
        let mut pipeline = PipelineConfig::new(overrides.threads.or(config.threads).unwrap_or(1))?;
        pipeline.verbose = overrides.verbose || config.verbose.unwrap_or(false);
        pipeline.retry_mode = if overrides.skip_unversioned_retry {
            RetryMode::SkipUnversioned
        } else {
            config.retry.unwrap_or_default()
        };

        let entry = config.service.unwrap_or_default();
        let defaults = ServiceConfig::default();
        let service = ServiceConfig {
            base_url: overrides
                .base_url
                .or(entry.base_url)
                .unwrap_or(defaults.base_url),
            timeout_secs: overrides
                .timeout_secs
                .or(entry.timeout_secs)
                .unwrap_or(defaults.timeout_secs),
            columns: entry.columns.unwrap_or(defaults.columns),
            format: entry.format.unwrap_or(defaults.format),
        };

        let input = InputConfig {
            path: Utf8PathBuf::from(
                overrides
                    .input
                    .or(config.input)
                    .unwrap_or_else(|| DEFAULT_INPUT.to_string()),
            ),
            description_column: overrides
                .description_column
                .or(config.description_column)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION_COLUMN.to_string()),
            sample: overrides.sample.or(config.sample),
            seed: overrides.seed.or(config.seed),
        };

        let output = OutputConfig {
            resolved_path: Utf8PathBuf::from(
                overrides
                    .output
                    .or(config.output)
                    .unwrap_or_else(|| DEFAULT_RESOLVED_OUTPUT.to_string()),
            ),
            unresolved_path: Utf8PathBuf::from(
                overrides
                    .error
                    .or(config.error)
                    .unwrap_or_else(|| DEFAULT_UNRESOLVED_OUTPUT.to_string()),
            ),
            force: overrides.force,
        };

        Ok(ResolvedConfig {
            pipeline,
            service,
            input,
            output,
        })
    }
}
