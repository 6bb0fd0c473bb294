use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use camino::Utf8Path;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kira_acc_resolver::app::{App, OverwritePrompt, RunSummary};
use kira_acc_resolver::config::{ConfigLoader, ConfigOverrides};
use kira_acc_resolver::error::ResolverError;
use kira_acc_resolver::output::{JsonOutput, OutputMode};
use kira_acc_resolver::scheduler::{BatchProgress, ProgressSink};
use kira_acc_resolver::uniprot::UniprotHttpClient;

#[derive(Parser)]
#[command(name = "acc-resolve")]
#[command(about = "Resolve accessions in an expression table to UniProt IDs and gene names")]
#[command(version, author)]
struct Cli {
    /// Tab-separated input table (.gz accepted)
    #[arg(short, long)]
    input: Option<String>,

    /// Destination for resolved accessions
    #[arg(short, long)]
    output: Option<String>,

    /// Destination for accessions without a UniProt hit
    #[arg(short, long)]
    error: Option<String>,

    /// Resolve a random subsample of this many rows
    #[arg(short, long)]
    sample: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Concurrent lookups per batch
    #[arg(short, long)]
    threads: Option<usize>,

    #[arg(long)]
    column: Option<String>,

    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Do not repeat a missed lookup for keys without a version suffix
    #[arg(long)]
    skip_unversioned_retry: bool,

    /// Overwrite existing outputs without asking
    #[arg(long)]
    force: bool,

    #[arg(long)]
    non_interactive: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ResolverError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ResolverError) -> u8 {
    match error {
        ResolverError::InvalidPoolWidth(_)
        | ResolverError::ConfigRead(_)
        | ResolverError::ConfigParse(_)
        | ResolverError::OutputExists(_)
        | ResolverError::Aborted => 2,
        ResolverError::HttpClient(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };
    let overrides = ConfigOverrides {
        threads: cli.threads,
        verbose: cli.verbose,
        skip_unversioned_retry: cli.skip_unversioned_retry,
        input: cli.input,
        description_column: cli.column,
        sample: cli.sample,
        seed: cli.seed,
        output: cli.output,
        error: cli.error,
        base_url: cli.base_url,
        timeout_secs: cli.timeout_secs,
        force: cli.force,
    };
    let resolved = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;

    let client = UniprotHttpClient::new(resolved.service.clone())?;
    let verbose = resolved.pipeline.verbose;
    let app = App::new(resolved, client);

    // progress stays on stderr, so stdout carries only the JSON summary
    let summary = app.run(output_mode, &StdinPrompt, &LogProgress { verbose })?;
    match output_mode {
        OutputMode::NonInteractive => JsonOutput::print(&summary).into_diagnostic()?,
        OutputMode::Interactive => print_run_summary(&summary),
    }
    Ok(())
}

struct StdinPrompt;

impl OverwritePrompt for StdinPrompt {
    fn confirm_overwrite(&self, path: &Utf8Path) -> Result<bool, ResolverError> {
        let io_err = |err: io::Error| ResolverError::OutputWrite {
            path: path.to_string(),
            message: err.to_string(),
        };
        let mut stderr = io::stderr();
        write!(stderr, "{path} already exists. Overwrite? (y/n)\t").map_err(io_err)?;
        stderr.flush().map_err(io_err)?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).map_err(io_err)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
    }
}

struct LogProgress {
    verbose: bool,
}

impl ProgressSink for LogProgress {
    fn batch_done(&self, progress: &BatchProgress) {
        info!(
            batch = progress.batch_index + 1,
            batches = progress.batch_count,
            processed = progress.processed,
            total = progress.total,
            "batch complete"
        );
        if self.verbose {
            eprintln!(
                "[{}/{}] {} of {} keys; resolved {}, unresolved {}",
                progress.batch_index + 1,
                progress.batch_count,
                progress.processed,
                progress.total,
                progress.resolved,
                progress.unresolved
            );
        }
    }
}

fn print_run_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}accession summary{reset}");
    println!("{cyan}  input: {} ({} keys){reset}", summary.input, summary.keys);
    if summary.rows_blank + summary.rows_without_accession > 0 {
        println!(
            "{yellow}  skipped rows: {} blank, {} without accession{reset}",
            summary.rows_blank, summary.rows_without_accession
        );
    }
    println!(
        "{green}  resolved: {} -> {}{reset}",
        summary.resolved, summary.resolved_path
    );
    println!(
        "{yellow}  unresolved: {} -> {}{reset}",
        summary.unresolved, summary.unresolved_path
    );
    println!("Finished in {} seconds", summary.elapsed_secs);
}
