//! Application startup and utilities.
//!
//! This module contains exit codes, tracing setup, and error hints
//! that support the main entry point.

use std::io::{self, Write};

use hotconf::render::render_validation_errors;
use hotconf::{ConfigError, LoadError, Snapshot, ValidationError};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Application exit codes.
pub mod exit_code {
    use std::process::ExitCode;

    /// Success (exit code 0).
    pub const SUCCESS: ExitCode = ExitCode::SUCCESS;

    /// Configuration error (exit code 1) - bad schema, unreadable or invalid config.
    pub const CONFIG_ERROR: ExitCode = ExitCode::FAILURE;

    /// Runtime error (exit code 2) - watch failure, output failure, etc.
    ///
    /// Note: This is a function rather than a constant because `ExitCode::from()` is not `const fn`.
    pub fn runtime_error() -> ExitCode {
        ExitCode::from(2)
    }
}

/// Prints helpful hints for common configuration errors.
pub fn print_config_hint(error: &ConfigError) {
    match error {
        ConfigError::Load(LoadError::UnknownExtension { .. }) => {
            eprintln!("\nSupported config formats: .toml, .json, .yaml, .yml");
        }
        ConfigError::InvalidOverride { .. } => {
            eprintln!("\nOverrides look like: --set log.level=debug");
        }
        ConfigError::Schema { .. } => {
            eprintln!("\nThe --schema file must contain a JSON Schema document.");
        }
        _ => {}
    }
}

/// Writes validation errors for `candidate` to stderr.
///
/// Installed as the provider's validation hook so both startup and reload
/// failures are shown next to the offending values.
pub fn report_validation_errors(candidate: &Snapshot, error: &ValidationError) {
    let mut stderr = io::stderr().lock();
    let written = render_validation_errors(&mut stderr, &candidate.to_json_bytes(), error)
        .and_then(|()| stderr.flush());
    if let Err(e) = written {
        tracing::error!("Failed to print validation errors: {e}");
    }
}

/// Sets up the tracing subscriber for logging.
pub fn setup_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
