//! Policy enforcer backed by an explicit set of granted policies.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use propguard::{EnforcementError, PolicyEnforcer, PolicyRule, PolicyVerdict, RequestContext};
use tracing::debug;

/// Resolves each target to its registered policy and allows it iff that
/// policy was granted on the command line.
#[derive(Debug, Default)]
pub struct GrantedPolicies {
    rules: RwLock<HashMap<String, PolicyRule>>,
    granted: HashSet<String>,
}

impl GrantedPolicies {
    pub fn new<I, S>(granted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rules: RwLock::default(),
            granted: granted.into_iter().map(Into::into).collect(),
        }
    }

    /// Registered `(target, rule)` pairs, sorted by target.
    pub fn registered(&self) -> Vec<(String, String)> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let mut registered: Vec<_> = rules
            .iter()
            .map(|(target, rule)| (target.clone(), rule.to_string()))
            .collect();
        registered.sort();
        registered
    }
}

impl PolicyEnforcer for GrantedPolicies {
    fn add_rules(&self, rules: HashMap<String, PolicyRule>) {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rules);
    }

    fn enforce(
        &self,
        _context: &RequestContext,
        target: &str,
        _attributes: &serde_json::Value,
    ) -> Result<PolicyVerdict, EnforcementError> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let rule = rules
            .get(target)
            .ok_or_else(|| EnforcementError::unknown_target(target))?;

        let granted = self.granted.contains(rule.policy());
        debug!(target, policy = rule.policy(), granted, "Resolved delegated policy");
        Ok(if granted {
            PolicyVerdict::Allowed
        } else {
            PolicyVerdict::Denied
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcer() -> GrantedPolicies {
        let enforcer = GrantedPolicies::new(["policyA"]);
        enforcer.add_rules(HashMap::from([
            ("^x_.*:create".to_string(), PolicyRule::delegate("policyA")),
            ("^x_.*:read".to_string(), PolicyRule::delegate("policyB")),
        ]));
        enforcer
    }

    #[test]
    fn test_granted_policy_allows() {
        let verdict = enforcer()
            .enforce(&RequestContext::new(), "^x_.*:create", &serde_json::json!({}))
            .unwrap();
        assert_eq!(verdict, PolicyVerdict::Allowed);
    }

    #[test]
    fn test_ungranted_policy_denies() {
        let verdict = enforcer()
            .enforce(&RequestContext::new(), "^x_.*:read", &serde_json::json!({}))
            .unwrap();
        assert_eq!(verdict, PolicyVerdict::Denied);
    }

    #[test]
    fn test_unknown_target_is_an_error() {
        let err = enforcer()
            .enforce(&RequestContext::new(), "^y:read", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, EnforcementError::UnknownTarget { .. }));
    }

    #[test]
    fn test_registered_is_sorted() {
        let registered = enforcer().registered();
        assert_eq!(
            registered,
            [
                ("^x_.*:create".to_string(), "rule:policyA".to_string()),
                ("^x_.*:read".to_string(), "rule:policyB".to_string()),
            ]
        );
    }
}
