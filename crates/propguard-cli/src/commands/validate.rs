use std::sync::Arc;

use anyhow::Result;
use propguard::ProtectionConfig;

use crate::cli::OutputFormat;
use crate::enforcer::GrantedPolicies;
use crate::output::{print_rules, print_success};

pub fn validate(config: &ProtectionConfig, format: OutputFormat) -> Result<()> {
    let enforcer = Arc::new(GrantedPolicies::default());
    let rules = super::load_rules(config, Arc::clone(&enforcer))?;

    print_rules(&rules, &enforcer.registered(), format)?;
    if matches!(format, OutputFormat::Table) {
        print_success(&format!("{} rule(s) loaded", rules.len()));
    }
    Ok(())
}
