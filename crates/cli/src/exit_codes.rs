//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                   |
//! |---------|------------|-----------------------------------------------|
//! | 0       | Universal  | Success                                       |
//! | 1       | Universal  | General error (unspecified)                   |
//! | 2       | Universal  | CLI usage error (bad args, missing file)      |
//! | 3-9     | run        | Input, configuration and pipeline outcomes    |
//! | 10-19   | copy       | Evidence gate / copy validation               |
//! | 20-29   | parity     | Reference comparison                          |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

use routegrid_config::ConfigError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run (3-9)
// =============================================================================

/// Input file could not be read or written.
pub const EXIT_RUN_IO: u8 = 3;

/// Input file is not valid JSON or CSV.
pub const EXIT_RUN_PARSE: u8 = 4;

/// Settings or mode policy file is invalid.
pub const EXIT_RUN_CONFIG: u8 = 5;

/// Requested mode is not defined by any policy.
pub const EXIT_RUN_UNKNOWN_MODE: u8 = 6;

/// The run produced a pipeline-fatal block (cardinality violation).
pub const EXIT_RUN_FATAL: u8 = 7;

/// The run finished but no entity reached readiness
/// (only with `--fail-on-empty`).
pub const EXIT_RUN_NOTHING_READY: u8 = 8;

// =============================================================================
// Copy (10-19)
// =============================================================================

/// Copy failed validation (at least one error).
pub const EXIT_COPY_REJECTED: u8 = 10;

/// Copy passed with warnings, but send-mode checks require a clean result.
pub const EXIT_COPY_WARNINGS: u8 = 11;

/// Neutralization could not remove activity language.
pub const EXIT_COPY_NEUTRALIZE_BLOCKED: u8 = 12;

// =============================================================================
// Parity (20-29)
// =============================================================================

/// Pipeline output diverged from the reference.
pub const EXIT_PARITY_DIVERGED: u8 = 20;

/// Snapshot file could not be read or parsed.
pub const EXIT_PARITY_SNAPSHOT: u8 = 21;

// =============================================================================
// Config Error Types
// =============================================================================

/// Map a ConfigError to its exit code.
pub fn config_exit_code(err: &ConfigError) -> u8 {
    match err {
        ConfigError::UnknownMode(_) => EXIT_RUN_UNKNOWN_MODE,
        ConfigError::Io(_) => EXIT_RUN_IO,
        ConfigError::Parse(_) | ConfigError::Validation(_) => EXIT_RUN_CONFIG,
    }
}
