//! Sealpost CLI - password-gated static content
//!
//! Build-time sealing of protected posts, plus a reader-side `unlock` that
//! re-derives the key and decrypts a page exactly as a browser would.

mod cli;
mod commands;
mod config;
mod helpers;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::{build, inspect, seal, unlock};
use crate::config::{load_config, SealpostConfig, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli).await {
        let error_msg = format!("{}", e);
        eprintln!("Error: {}", error_msg);
        if let Some(hint) = extract_error_hint(&error_msg) {
            eprintln!("{}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        generate(*shell, &mut cmd, "sealpost", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config);

    match &cli.command {
        Commands::Build(args) => build::handle_build(&config, args, cli.quiet).await,
        Commands::Seal(args) => seal::handle_seal(&config, args, cli.quiet).await,
        Commands::Unlock(args) => unlock::handle_unlock(args, cli.quiet).await,
        Commands::Inspect(args) => inspect::handle_inspect(args),
        Commands::Completions { .. } => Ok(()),
    }
}

/// `SEALPOST_LOG`, else the config's `log.filter`, else `warn`. Logs go to stderr.
fn init_tracing(config: &SealpostConfig) {
    let filter = EnvFilter::try_from_env("SEALPOST_LOG").unwrap_or_else(|_| {
        EnvFilter::try_new(config.log_filter().unwrap_or(DEFAULT_LOG_FILTER))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Contextual hints for common failures.
fn extract_error_hint(error: &str) -> Option<String> {
    if let Some(idx) = error.find("\nHint:") {
        return Some(error[idx + 1..].to_string());
    }

    let error_lower = error.to_lowercase();

    if error_lower.contains("password not found") {
        return Some(
            "Hint: Add the missing keys to SEALPOST_PASSWORDS, e.g. {\"posts:hello\":\"...\"}."
                .to_string(),
        );
    }

    if error_lower.contains("sealpost_passwords") {
        return Some(
            "Hint: SEALPOST_PASSWORDS must be a JSON object of \"collection:post\" to password."
                .to_string(),
        );
    }

    if error_lower.contains("failed to read config") {
        return Some("Hint: Pass --config or set SEALPOST_CONFIG to an existing file.".to_string());
    }

    if error_lower.contains("incorrect password or corrupted content") {
        return Some("Hint: Passwords are case-sensitive.".to_string());
    }

    None
}
