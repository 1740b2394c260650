//! `dedup run` / `dedup validate`: config-driven duplicate reconciliation.

use std::path::{Path, PathBuf};

use dedup_recon::load::load_input;
use dedup_recon::{ReconConfig, ReconError};

use crate::exit_codes::{
    recon_exit_code, EXIT_ERROR, EXIT_RECON_DUPLICATES, EXIT_RECON_INVALID_CONFIG,
    EXIT_RECON_RUNTIME,
};
use crate::CliError;

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::InvalidThreshold(_) => {
                Some("thresholds are percentages with low <= high (reference: 60 / 70)".to_string())
            }
            ReconError::CorpusTooLarge { .. } => {
                Some("raise [limits] max_corpus_size or split the corpus".to_string())
            }
            ReconError::UnsupportedFormat(_) => Some("feeds must end in .csv or .xml".to_string()),
            _ => None,
        };
        CliError { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}

fn read_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_ERROR, format!("cannot read config: {e}")))?;
    Ok(ReconConfig::from_toml(&config_str)?)
}

pub fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    strict: bool,
    workers: usize,
) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let input_config = config.input.as_ref().ok_or_else(|| {
        recon_err(EXIT_RECON_INVALID_CONFIG, "config has no [input] section")
            .with_hint("add [input] with `candidates` and `corpus` file paths")
    })?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    tracing::info!(config = %config_path.display(), "loading inputs");
    let input = load_input(input_config, base_dir)?;

    let result = dedup_recon::run_with_workers(&config, &input, workers)?;

    // Output
    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("JSON serialization error: {e}")))?;

    let output_path = output_file.or_else(|| config.output.json.as_ref().map(|p| base_dir.join(p)));
    if let Some(ref path) = output_path {
        std::fs::write(path, &json_str)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    // Human summary to stderr
    let s = &result.summary;
    eprintln!(
        "{}: {} candidate(s) against {} record(s): {} to import, {} to review, {} refused, {} rejected",
        result.meta.config_name,
        s.total,
        result.meta.corpus_size,
        s.to_import,
        s.to_review,
        s.refused,
        s.rejected,
    );
    for row in &result.rejected {
        eprintln!("  rejected: {}", row.reason);
    }

    if strict && (s.refused > 0 || s.to_review > 0) {
        return Err(recon_err(EXIT_RECON_DUPLICATES, "duplicates found (--strict)"));
    }
    if strict && s.rejected > 0 {
        return Err(recon_err(EXIT_RECON_DUPLICATES, "feed rows rejected (--strict)"));
    }

    Ok(())
}

pub fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let thresholds = config.thresholds()?;
    eprintln!(
        "valid: '{}' refuse >= {}, review >= {}, normalization {}, corpus limit {}",
        config.name,
        thresholds.low(),
        thresholds.high(),
        config.similarity.normalization,
        config.limits.max_corpus_size,
    );
    if config.input.is_none() {
        eprintln!("note: no [input] section; `dedup run` needs one");
    }
    Ok(())
}
