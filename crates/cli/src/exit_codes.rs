//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; import pipelines rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain           | Description                              |
//! |---------|------------------|------------------------------------------|
//! | 0       | Universal        | Success                                  |
//! | 1       | Universal        | General error (unreadable config file)   |
//! | 2       | Universal        | CLI usage error (bad args, missing file) |
//! | 3-9     | recon            | Reconciliation-specific codes            |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use dedup_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - the config file itself could not be read.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (3-9)
// =============================================================================

/// Config could not be parsed or failed validation (thresholds included).
pub const EXIT_RECON_INVALID_CONFIG: u8 = 3;

/// Runtime failure: unreadable or malformed feed, corpus over limit, write error.
pub const EXIT_RECON_RUNTIME: u8 = 4;

/// `--strict` only: a candidate was refused or needs review, or a feed row was rejected.
pub const EXIT_RECON_DUPLICATES: u8 = 5;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::InvalidThreshold(_)
        | ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::MissingColumn { .. }
        | ReconError::MissingName { .. }
        | ReconError::DateParse { .. }
        | ReconError::IdParse { .. }
        | ReconError::Csv { .. }
        | ReconError::Xml(_)
        | ReconError::UnsupportedFormat(_)
        | ReconError::CorpusTooLarge { .. }
        | ReconError::Io(_) => EXIT_RECON_RUNTIME,
    }
}
