use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use propguard::{PolicyEnforcer, ProtectionConfig, ReloadablePropertyRules};
use tracing::info;

use crate::enforcer::GrantedPolicies;
use crate::output::print_success;

pub async fn watch(config: &ProtectionConfig) -> Result<()> {
    super::ensure_enabled(config)?;
    let enforcer: Arc<dyn PolicyEnforcer> = Arc::new(GrantedPolicies::default());
    let rules = ReloadablePropertyRules::new(config.clone(), Some(enforcer))
        .context("failed to load property protections")?;
    let handle = rules
        .watch_if_enabled()
        .context("failed to start watching the protection file")?
        .context("property_protection.watch is disabled")?;

    print_success(&format!(
        "{} rule(s) loaded; watching {} (Ctrl-C to stop)",
        rules.rules().len(),
        handle.path().display()
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    handle.stop().await;

    let stats = rules.stats();
    info!(reloads = stats.reloads, failures = stats.failures, "Watch stopped");
    println!(
        "{}: {} reload(s), {} failure(s)",
        "Stopped".cyan(),
        stats.reloads,
        stats.failures
    );
    Ok(())
}
