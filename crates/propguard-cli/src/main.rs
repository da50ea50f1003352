mod cli;
mod commands;
mod enforcer;
mod observability;
mod output;
mod settings;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    let outcome = run().await;
    if let Err(e) = &outcome {
        print_error(&format!("{e:#}"));
    }
    let code = exit_code(&outcome);
    if code != 0 {
        std::process::exit(code);
    }
}

/// 0 when allowed or done, 1 on error, 2 when a check was denied.
fn exit_code(outcome: &Result<bool>) -> i32 {
    match outcome {
        Ok(true) => 0,
        Ok(false) => 2,
        Err(_) => 1,
    }
}

/// Returns `false` when a check was denied.
async fn run() -> Result<bool> {
    let cli = Cli::parse();
    let mut settings = settings::load_settings(cli.settings.as_deref())?;
    settings.apply_overrides(&cli);
    observability::init_tracing_with_level(&settings.logging.level);

    let format = cli.format.unwrap_or_default();
    let protection = &settings.property_protection;

    match &cli.command {
        Commands::Validate => commands::validate::validate(protection, format)?,
        Commands::Check(args) => return commands::check::check(protection, args, format),
        Commands::Watch => commands::watch::watch(protection).await?,
    }
    Ok(true)
}
