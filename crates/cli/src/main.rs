// dedup CLI - reconcile incoming computer feeds against the stored catalogue

mod exit_codes;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use dedup_recon::{Levenshtein, Normalization, SimilarityMetric};

use exit_codes::{EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "dedup")]
#[command(about = "Fuzzy duplicate detection for record imports")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the candidate feed against the corpus named in a TOML config
    #[command(after_help = "\
Examples:
  dedup run import.toml
  dedup run import.toml --json
  dedup run import.toml --output report.json
  dedup run import.toml --strict --workers 4")]
    Run {
        /// Path to the reconciliation config file
        config: PathBuf,

        /// Also print the JSON result to stdout (the summary stays on stderr)
        #[arg(long)]
        json: bool,

        /// Write JSON output to file (overrides [output] json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Exit non-zero when any candidate is refused, needs review, or was rejected
        #[arg(long)]
        strict: bool,

        /// Threads used to classify candidates
        #[arg(long, default_value_t = 1, env = "DEDUP_WORKERS")]
        workers: usize,
    },

    /// Validate a config without running
    #[command(after_help = "\
Examples:
  dedup validate import.toml")]
    Validate {
        /// Path to the reconciliation config file
        config: PathBuf,
    },

    /// Print the similarity score of two names
    #[command(after_help = "\
Examples:
  dedup score Macintosh Macintош
  dedup score 'IBM PC' 'ibm pc' --normalization folded")]
    Score {
        a: String,
        b: String,

        /// Name normalization applied before comparing
        #[arg(long, value_enum, default_value = "exact")]
        normalization: NormalizationArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NormalizationArg {
    Exact,
    Folded,
}

impl From<NormalizationArg> for Normalization {
    fn from(arg: NormalizationArg) -> Self {
        match arg {
            NormalizationArg::Exact => Normalization::Exact,
            NormalizationArg::Folded => Normalization::Folded,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "dedup=warn,dedup_recon=warn",
        1 => "dedup=info,dedup_recon=info",
        _ => "dedup=debug,dedup_recon=debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run { config, json, output, strict, workers } => {
            if workers == 0 {
                Err(CliError::args("--workers must be at least 1"))
            } else {
                recon::cmd_recon_run(config, json, output, strict, workers)
            }
        }
        Commands::Validate { config } => recon::cmd_recon_validate(config),
        Commands::Score { a, b, normalization } => cmd_score(&a, &b, normalization.into()),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn cmd_score(a: &str, b: &str, normalization: Normalization) -> Result<(), CliError> {
    let score = Levenshtein::new(normalization).similarity(a, b);
    println!("{score}");
    Ok(())
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
