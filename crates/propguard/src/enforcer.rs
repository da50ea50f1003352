//! Policy enforcer boundary.
//!
//! In `policies` format the ruleset does not decide by itself: each
//! (property expression, operation) pair that names a policy is registered
//! with a [`PolicyEnforcer`] as a rule called `<expression>:<operation>`
//! whose body delegates to that policy (`rule:<policy>`). Registration
//! happens once, while the ruleset is compiled. At decision time the
//! enforcer is asked to enforce the same target name.
//!
//! The syntax and meaning of the named policies belong to the enforcer.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::context::RequestContext;
use crate::error::EnforcementError;
use crate::operation::Operation;

// =============================================================================
// Policy Rule
// =============================================================================

/// A rule body that delegates to a named policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PolicyRule {
    policy: String,
}

impl PolicyRule {
    /// Create a rule delegating to `policy`.
    #[must_use]
    pub fn delegate(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
        }
    }

    /// Name of the policy this rule delegates to.
    #[must_use]
    pub fn policy(&self) -> &str {
        &self.policy
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule:{}", self.policy)
    }
}

// =============================================================================
// Policy Verdict
// =============================================================================

/// Outcome of enforcing a registered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    /// The requester satisfies the rule.
    Allowed,
    /// The requester does not satisfy the rule.
    Denied,
}

impl PolicyVerdict {
    /// Returns `true` for [`PolicyVerdict::Allowed`].
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

// =============================================================================
// Policy Enforcer
// =============================================================================

/// External policy evaluator used by the `policies` rule format.
///
/// `enforce` may block. Implementations decide their own concurrency
/// contract; the ruleset calls it from whatever thread asks for a decision.
pub trait PolicyEnforcer: Send + Sync {
    /// Register named rules, replacing existing rules with the same names.
    fn add_rules(&self, rules: HashMap<String, PolicyRule>);

    /// Evaluate the rule registered as `target` for the requester.
    ///
    /// A denial is `Ok(PolicyVerdict::Denied)`. `Err` is reserved for
    /// failures that are not a verdict.
    fn enforce(
        &self,
        context: &RequestContext,
        target: &str,
        attributes: &serde_json::Value,
    ) -> Result<PolicyVerdict, EnforcementError>;
}

/// Qualified rule name for a property expression and operation.
#[must_use]
pub fn policy_target(expression: &str, operation: Operation) -> String {
    format!("{expression}:{operation}")
}

/// Submit a compiled ruleset's `<expression>:<operation> -> rule:<policy>`
/// entries to the enforcer in one call.
pub(crate) fn register_policy_rules(
    enforcer: &dyn PolicyEnforcer,
    rules: HashMap<String, PolicyRule>,
) {
    if rules.is_empty() {
        return;
    }
    for (name, rule) in &rules {
        debug!(rule_name = %name, rule = %rule, "Registering property protection policy rule");
    }
    enforcer.add_rules(rules);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        rules: Mutex<Vec<(String, PolicyRule)>>,
        calls: Mutex<usize>,
    }

    impl PolicyEnforcer for Recorder {
        fn add_rules(&self, rules: HashMap<String, PolicyRule>) {
            *self.calls.lock().unwrap() += 1;
            self.rules.lock().unwrap().extend(rules);
        }

        fn enforce(
            &self,
            _context: &RequestContext,
            target: &str,
            _attributes: &serde_json::Value,
        ) -> Result<PolicyVerdict, EnforcementError> {
            Err(EnforcementError::unknown_target(target))
        }
    }

    #[test]
    fn test_policy_rule_display() {
        let rule = PolicyRule::delegate("image_creator");
        assert_eq!(rule.policy(), "image_creator");
        assert_eq!(rule.to_string(), "rule:image_creator");
    }

    #[test]
    fn test_policy_target() {
        assert_eq!(policy_target("^x_.*", Operation::Create), "^x_.*:create");
        assert_eq!(policy_target("prop_a", Operation::Delete), "prop_a:delete");
    }

    #[test]
    fn test_register_submits_rules_in_one_call() {
        let recorder = Recorder::default();
        register_policy_rules(
            &recorder,
            HashMap::from([
                (
                    policy_target("prop_a", Operation::Read),
                    PolicyRule::delegate("reader_policy"),
                ),
                (
                    policy_target("prop_a", Operation::Delete),
                    PolicyRule::delegate("admin_policy"),
                ),
            ]),
        );

        assert_eq!(*recorder.calls.lock().unwrap(), 1);
        let mut rules = recorder.rules.lock().unwrap().clone();
        rules.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].0, "prop_a:delete");
        assert_eq!(rules[0].1.to_string(), "rule:admin_policy");
        assert_eq!(rules[1].0, "prop_a:read");
        assert_eq!(rules[1].1.to_string(), "rule:reader_policy");
    }

    #[test]
    fn test_register_skips_empty_ruleset() {
        let recorder = Recorder::default();
        register_policy_rules(&recorder, HashMap::new());
        assert_eq!(*recorder.calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_verdict() {
        assert!(PolicyVerdict::Allowed.is_allowed());
        assert!(!PolicyVerdict::Denied.is_allowed());
    }
}
