pub mod check;
pub mod validate;
pub mod watch;

use std::sync::Arc;

use anyhow::{Context, Result};
use propguard::{PolicyEnforcer, PropertyRules, ProtectionConfig};

use crate::enforcer::GrantedPolicies;

pub(crate) fn ensure_enabled(config: &ProtectionConfig) -> Result<()> {
    if !config.is_enabled() {
        anyhow::bail!(
            "no property protection file configured (use --file or property_protection.file)"
        );
    }
    Ok(())
}

/// Compile the configured protection file against `enforcer`.
pub(crate) fn load_rules(
    config: &ProtectionConfig,
    enforcer: Arc<GrantedPolicies>,
) -> Result<PropertyRules> {
    ensure_enabled(config)?;
    let enforcer: Arc<dyn PolicyEnforcer> = enforcer;
    PropertyRules::from_config(config, Some(enforcer)).with_context(|| {
        format!(
            "failed to load property protections from {}",
            config
                .file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })
}
