use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};

use fqdelta::config::{DEFAULT_MATCH_WINDOW, DEFAULT_RESYNC_WINDOW};
use fqdelta::{ops, DeltaConfig, DeltaConfigBuilder, DiffConfigBuilder, Input};

#[derive(Parser)]
#[command(name = "fqdelta")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Store processed FASTQ files as deltas against their original", long_about = None)]
#[command(
    after_help = "Original files may be plain, gzip/bzip2/xz/zstd compressed, or Quip (.qp, requires \
                  unquip on PATH). Use - to read a file from stdin. Exit code 1 indicates a failed \
                  checksum, exit code 2 a missing checksum in the container."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a delta container from an original and a processed FASTQ
    Delta(DeltaArgs),
    /// Rebuild a processed FASTQ from its original and a delta container
    Rebuild(RebuildArgs),
}

#[derive(Args)]
struct TuningArgs {
    /// Time budget of a single field comparison, in microseconds
    #[arg(long, value_name = "US", default_value = "500")]
    timeout_us: u64,

    /// Longest changed span diffed character by character
    #[arg(long, value_name = "CHARS", default_value_t = DEFAULT_MATCH_WINDOW)]
    match_window: usize,

    /// Original records searched ahead for a processed record's identifier
    #[arg(long, value_name = "RECORDS", default_value_t = DEFAULT_RESYNC_WINDOW)]
    resync_window: usize,

    /// Directory for temporary files
    #[arg(long, value_name = "DIR")]
    temp_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct DeltaArgs {
    /// The original FASTQ file
    #[arg(value_name = "ORIGINAL")]
    original: PathBuf,

    /// The processed FASTQ file
    #[arg(value_name = "PROCESSED")]
    processed: PathBuf,

    /// Name of the delta, defaults to the processed file name (.zip is appended)
    #[arg(short, long, value_name = "NAME")]
    output: Option<PathBuf>,

    /// Echo the processed records to stdout
    #[arg(long)]
    stdout: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

#[derive(Parser)]
struct RebuildArgs {
    /// The original FASTQ file
    #[arg(value_name = "ORIGINAL")]
    original: PathBuf,

    /// The delta container
    #[arg(value_name = "DELTA")]
    delta: PathBuf,

    /// Output FASTQ file, defaults to stdout
    #[arg(value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Write to stdout in addition to the output file
    #[arg(long)]
    stdout: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

impl TuningArgs {
    fn into_config(self) -> DeltaConfig {
        let diff = DiffConfigBuilder::new()
            .timeout(Duration::from_micros(self.timeout_us))
            .match_window(self.match_window)
            .build();
        let mut builder = DeltaConfigBuilder::default()
            .diff(diff)
            .resync_window(self.resync_window);
        if let Some(dir) = self.temp_dir {
            builder = builder.temp_dir(dir);
        }
        builder.build()
    }
}

fn run_delta(args: DeltaArgs) -> fqdelta::Result<()> {
    let original = Input::from(args.original);
    let processed = Input::from(args.processed);
    let config = args.tuning.into_config();
    let container = ops::create_files(
        &original,
        &processed,
        args.output.as_deref(),
        &config,
        args.stdout,
    )?;
    info!("Wrote {}", container.display());
    Ok(())
}

fn run_rebuild(args: RebuildArgs) -> fqdelta::Result<()> {
    let original = Input::from(args.original);
    let config = args.tuning.into_config();
    ops::rebuild_files(
        &args.delta,
        &original,
        args.output.as_deref(),
        &config,
        args.stdout,
    )?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Delta(args) => run_delta(args),
        Commands::Rebuild(args) => run_rebuild(args),
    };

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            error!("{e}");
            Ok(ExitCode::from(ops::exit_code(&e)))
        }
    }
}
