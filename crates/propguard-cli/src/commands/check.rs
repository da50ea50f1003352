use std::sync::Arc;

use anyhow::Result;
use propguard::{ProtectionConfig, RequestContext};

use crate::cli::{CheckArgs, OutputFormat};
use crate::enforcer::GrantedPolicies;
use crate::output::print_decision;

/// Returns whether the operation was allowed.
pub fn check(config: &ProtectionConfig, args: &CheckArgs, format: OutputFormat) -> Result<bool> {
    let enforcer = Arc::new(GrantedPolicies::new(args.granted_policies.iter().cloned()));
    let rules = super::load_rules(config, enforcer)?;

    let mut context = RequestContext::new().with_roles(args.roles.iter().cloned());
    if let Some(user) = &args.user {
        context = context.with_user(user.clone());
    }
    if let Some(project) = &args.project {
        context = context.with_project(project.clone());
    }

    let decision = rules.evaluate(&args.property, &args.operation, &context)?;
    print_decision(&args.property, &args.operation, &decision, format)?;
    Ok(decision.is_allowed())
}
