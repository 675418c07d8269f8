//! hotconf: layered, schema-validated configuration
//!
//! Entry point for the hotconf application.

use std::process::ExitCode;

use hotconf::cli::{Cli, Command};
use hotconf::{ConfigError, Provider, ProviderBuilder};

mod app;
mod run;

use app::{exit_code, print_config_hint, report_validation_errors, setup_tracing};

/// Main entry point.
///
/// Excluded from coverage as it's the thin wrapper around testable components.
#[cfg(not(tarpaulin_include))]
fn main() -> ExitCode {
    let cli = Cli::parse_args();
    setup_tracing(cli.verbose);

    match cli.command {
        Command::Check(args) => match load(args.builder()) {
            Ok(provider) => handle_check(&provider),
            Err(code) => code,
        },
        Command::Watch(args) => match load(args.builder()) {
            Ok(provider) => run_application(provider),
            Err(code) => code,
        },
    }
}

/// Builds the provider, reporting configuration errors.
fn load(builder: Result<ProviderBuilder, ConfigError>) -> Result<Provider, ExitCode> {
    let result = builder.and_then(|b| b.with_on_validation_error(report_validation_errors).build());
    result.map_err(|e| {
        // Validation issues are already shown by the hook.
        if !matches!(e, ConfigError::Validation(_)) {
            eprintln!("Configuration error: {e}");
            print_config_hint(&e);
        }
        exit_code::CONFIG_ERROR
    })
}

/// Handles the `check` subcommand.
fn handle_check(provider: &Provider) -> ExitCode {
    match run::check(provider, &mut std::io::stdout().lock()) {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code::runtime_error()
        }
    }
}

/// Runs the watch loop with the given provider.
///
/// Excluded from coverage - requires async runtime.
#[cfg(not(tarpaulin_include))]
fn run_application(provider: Provider) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to create Tokio runtime: {e}");
            return exit_code::runtime_error();
        }
    };

    match runtime.block_on(run::execute(provider)) {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            tracing::error!("Application error: {e}");
            exit_code::runtime_error()
        }
    }
}
