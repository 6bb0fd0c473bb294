use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ResolverError {
    #[error("invalid accession: {0:?}")]
    InvalidAccession(String),

    #[error("pool width must be at least 1, got {0}")]
    #[diagnostic(help("pass --threads with a positive value"))]
    InvalidPoolWidth(usize),

    #[error("failed to read config file at {0}")]
    ConfigRead(String),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read input {path}: {message}")]
    InputRead { path: String, message: String },

    #[error("malformed input at line {line}: {message}")]
    InputParse { line: usize, message: String },

    #[error("input has no column named {0:?}")]
    MissingColumn(String),

    #[error("failed to write output {path}: {message}")]
    OutputWrite { path: String, message: String },

    #[error("output file already exists: {0}")]
    #[diagnostic(help("rerun with --force to overwrite"))]
    OutputExists(String),

    #[error("aborted: existing output was not overwritten")]
    Aborted,

    #[error("uniprot client setup failed: {0}")]
    HttpClient(String),

    #[error("batch of {len} keys exceeds pool width {width}")]
    BatchTooLarge { len: usize, width: usize },

    #[error("worker pool lost a job: {0}")]
    WorkerLost(String),
}
