//! Property protection decisions.
//!
//! # Evaluation Order
//!
//! 1. An operation outside create/read/update/delete is denied.
//! 2. A ruleset with no rules allows everything.
//! 3. The first rule whose expression is found in the property name decides:
//!    - no tokens for the operation: denied
//!    - `roles` format: allowed iff the requester holds one of the roles
//!    - `policies` format: the policy enforcer decides
//! 4. No matching rule: denied.
//!
//! Evaluation never modifies the ruleset, so a compiled [`PropertyRules`]
//! can serve any number of concurrent callers.

use std::fmt;

use serde::Serialize;
use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::enforcer::{PolicyVerdict, policy_target};
use crate::error::EnforcementError;
use crate::operation::{Operation, RuleFormat};
use crate::rules::PropertyRules;

// =============================================================================
// Decision
// =============================================================================

/// Why a decision was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum DecisionReason {
    /// The ruleset is empty; protection is disabled.
    ProtectionDisabled,
    /// The operation is not one of the four known operations.
    UnknownOperation {
        /// The requested action.
        operation: String,
    },
    /// No rule matched the property.
    NoMatchingRule,
    /// The matching rule grants the operation to nobody.
    #[serde(rename_all = "camelCase")]
    OperationForbidden {
        /// Position of the matching rule.
        rule_index: usize,
    },
    /// The requester holds a granted role.
    #[serde(rename_all = "camelCase")]
    RoleGranted {
        /// Position of the matching rule.
        rule_index: usize,
        /// The first granted role the requester holds.
        role: String,
    },
    /// The requester holds none of the granted roles.
    #[serde(rename_all = "camelCase")]
    RolesMissing {
        /// Position of the matching rule.
        rule_index: usize,
    },
    /// The policy enforcer allowed the target.
    #[serde(rename_all = "camelCase")]
    PolicyAllowed {
        /// Position of the matching rule.
        rule_index: usize,
        /// The enforced `<expression>:<operation>` name.
        target: String,
    },
    /// The policy enforcer denied the target.
    #[serde(rename_all = "camelCase")]
    PolicyDenied {
        /// Position of the matching rule.
        rule_index: usize,
        /// The enforced `<expression>:<operation>` name.
        target: String,
    },
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProtectionDisabled => write!(f, "no protection rules are configured"),
            Self::UnknownOperation { operation } => write!(f, "unknown operation '{operation}'"),
            Self::NoMatchingRule => write!(f, "no rule matches the property"),
            Self::OperationForbidden { rule_index } => {
                write!(f, "rule #{rule_index} grants the operation to nobody")
            }
            Self::RoleGranted { rule_index, role } => {
                write!(f, "rule #{rule_index} grants role '{role}'")
            }
            Self::RolesMissing { rule_index } => {
                write!(f, "requester holds none of the roles of rule #{rule_index}")
            }
            Self::PolicyAllowed { rule_index, target } => {
                write!(f, "rule #{rule_index}: policy '{target}' allowed")
            }
            Self::PolicyDenied { rule_index, target } => {
                write!(f, "rule #{rule_index}: policy '{target}' denied")
            }
        }
    }
}

/// Outcome of a property protection check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyDecision {
    /// Whether the operation is permitted.
    pub allowed: bool,
    /// Why.
    pub reason: DecisionReason,
}

impl PropertyDecision {
    fn allow(reason: DecisionReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    /// Returns `true` if the operation is permitted.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

// =============================================================================
// Evaluation
// =============================================================================

impl PropertyRules {
    /// Decide whether `operation` on `property` is permitted for the requester.
    ///
    /// Unknown operations are denied. Errors only come from the policy
    /// enforcer and are never a verdict.
    pub fn check(
        &self,
        property: &str,
        operation: &str,
        context: &RequestContext,
    ) -> Result<bool, EnforcementError> {
        self.evaluate(property, operation, context)
            .map(|decision| decision.is_allowed())
    }

    /// Typed form of [`PropertyRules::check`].
    pub fn check_operation(
        &self,
        property: &str,
        operation: Operation,
        context: &RequestContext,
    ) -> Result<bool, EnforcementError> {
        self.evaluate_operation(property, operation, context)
            .map(|decision| decision.is_allowed())
    }

    /// Decide and report the reason.
    pub fn evaluate(
        &self,
        property: &str,
        operation: &str,
        context: &RequestContext,
    ) -> Result<PropertyDecision, EnforcementError> {
        match operation.parse::<Operation>() {
            Ok(operation) => self.evaluate_operation(property, operation, context),
            Err(_) => {
                debug!(property, operation, "Denying unknown property operation");
                Ok(PropertyDecision::deny(DecisionReason::UnknownOperation {
                    operation: operation.to_string(),
                }))
            }
        }
    }

    /// Typed form of [`PropertyRules::evaluate`].
    pub fn evaluate_operation(
        &self,
        property: &str,
        operation: Operation,
        context: &RequestContext,
    ) -> Result<PropertyDecision, EnforcementError> {
        if self.rules.is_empty() {
            return Ok(PropertyDecision::allow(DecisionReason::ProtectionDisabled));
        }

        let Some((rule_index, rule)) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(property))
        else {
            debug!(property, operation = %operation, "No property protection rule matched");
            return Ok(PropertyDecision::deny(DecisionReason::NoMatchingRule));
        };

        let granted = rule.permissions().get(operation);
        trace!(
            property,
            operation = %operation,
            rule_index,
            rule = rule.pattern().as_str(),
            "Property protection rule matched"
        );

        if granted.is_empty() {
            return Ok(PropertyDecision::deny(DecisionReason::OperationForbidden {
                rule_index,
            }));
        }

        let decision = match self.rule_format {
            RuleFormat::Roles => match granted.iter().find(|role| context.has_role(role)) {
                Some(role) => PropertyDecision::allow(DecisionReason::RoleGranted {
                    rule_index,
                    role: role.clone(),
                }),
                None => PropertyDecision::deny(DecisionReason::RolesMissing { rule_index }),
            },
            RuleFormat::Policies => self.enforce_policy(rule_index, operation, context)?,
        };

        debug!(
            property,
            operation = %operation,
            rule_index,
            allowed = decision.allowed,
            "Property protection decision"
        );
        Ok(decision)
    }

    fn enforce_policy(
        &self,
        rule_index: usize,
        operation: Operation,
        context: &RequestContext,
    ) -> Result<PropertyDecision, EnforcementError> {
        let (Some(expression), Some(enforcer)) =
            (self.policy_expression(rule_index), self.enforcer.as_ref())
        else {
            // compile() records both for every rule carrying a policy
            return Err(EnforcementError::evaluation(format!(
                "no policy registered for rule #{rule_index}"
            )));
        };

        let target = policy_target(expression, operation);
        let verdict = enforcer.enforce(context, &target, &serde_json::json!({}))?;
        Ok(match verdict {
            PolicyVerdict::Allowed => {
                PropertyDecision::allow(DecisionReason::PolicyAllowed { rule_index, target })
            }
            PolicyVerdict::Denied => {
                PropertyDecision::deny(DecisionReason::PolicyDenied { rule_index, target })
            }
        })
    }

    // =========================================================================
    // Property Sets
    // =========================================================================

    /// Keep only the properties the requester may read.
    pub fn readable_properties<'a, I>(
        &self,
        properties: I,
        context: &RequestContext,
    ) -> Result<Vec<&'a str>, EnforcementError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut readable = Vec::new();
        for property in properties {
            if self.check_operation(property, Operation::Read, context)? {
                readable.push(property);
            }
        }
        Ok(readable)
    }

    /// Properties the requester may not `operation`, in input order.
    ///
    /// An empty result means the whole set is permitted.
    pub fn forbidden_properties<'a, I>(
        &self,
        properties: I,
        operation: Operation,
        context: &RequestContext,
    ) -> Result<Vec<&'a str>, EnforcementError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut forbidden = Vec::new();
        for property in properties {
            if !self.check_operation(property, operation, context)? {
                forbidden.push(property);
            }
        }
        Ok(forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcer::{PolicyEnforcer, PolicyRule};
    use crate::source::MemoryRuleSource;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    // -------------------------------------------------------------------------
    // Test Helpers
    // -------------------------------------------------------------------------

    /// Allows a target iff its delegated policy is in `granted`.
    #[derive(Default)]
    struct StubEnforcer {
        rules: Mutex<HashMap<String, PolicyRule>>,
        granted: HashSet<String>,
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    impl StubEnforcer {
        fn granting(policies: &[&str]) -> Self {
            Self {
                granted: policies.iter().map(|p| p.to_string()).collect(),
                ..Default::default()
            }
        }
    }

    impl PolicyEnforcer for StubEnforcer {
        fn add_rules(&self, rules: HashMap<String, PolicyRule>) {
            self.rules.lock().unwrap().extend(rules);
        }

        fn enforce(
            &self,
            _context: &RequestContext,
            target: &str,
            _attributes: &serde_json::Value,
        ) -> Result<PolicyVerdict, EnforcementError> {
            self.calls.lock().unwrap().push(target.to_string());
            if self.fail {
                return Err(EnforcementError::evaluation("backend down"));
            }
            let rules = self.rules.lock().unwrap();
            let rule = rules
                .get(target)
                .ok_or_else(|| EnforcementError::unknown_target(target))?;
            Ok(if self.granted.contains(rule.policy()) {
                PolicyVerdict::Allowed
            } else {
                PolicyVerdict::Denied
            })
        }
    }

    fn roles_rules(source: &MemoryRuleSource) -> PropertyRules {
        PropertyRules::compile(source, "roles", None).unwrap()
    }

    fn ctx(roles: &[&str]) -> RequestContext {
        RequestContext::new().with_roles(roles.iter().copied())
    }

    // -------------------------------------------------------------------------
    // Roles Format
    // -------------------------------------------------------------------------

    #[test]
    fn test_unknown_operation_is_denied() {
        let rules = roles_rules(&MemoryRuleSource::new().section(".*", [("read", "admin")]));
        let decision = rules.evaluate("x", "execute", &ctx(&["admin"])).unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            decision.reason,
            DecisionReason::UnknownOperation {
                operation: "execute".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_operation_denied_even_when_empty() {
        let rules = roles_rules(&MemoryRuleSource::new());
        assert!(!rules.check("x", "execute", &ctx(&[])).unwrap());
        assert!(rules.check("x", "read", &ctx(&[])).unwrap());
    }

    #[test]
    fn test_empty_ruleset_allows() {
        let rules = roles_rules(&MemoryRuleSource::new());
        let decision = rules.evaluate_operation("x", Operation::Delete, &ctx(&[])).unwrap();
        assert_eq!(decision.reason, DecisionReason::ProtectionDisabled);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_no_match_is_denied() {
        let rules = roles_rules(&MemoryRuleSource::new().section("^a", [("read", "admin")]));
        let decision = rules.evaluate("zzz", "read", &ctx(&["admin"])).unwrap();
        assert_eq!(decision.reason, DecisionReason::NoMatchingRule);
    }

    #[test]
    fn test_search_semantics() {
        let rules = roles_rules(&MemoryRuleSource::new().section("owner", [("read", "admin")]));
        assert!(rules.check("x_owner_id", "read", &ctx(&["admin"])).unwrap());
    }

    #[test]
    fn test_first_match_wins_even_when_denying() {
        let rules = roles_rules(
            &MemoryRuleSource::new()
                .section("^x", [("read", "admin")])
                .section(".*", [("read", "member")]),
        );
        let decision = rules.evaluate("x", "read", &ctx(&["member"])).unwrap();
        assert_eq!(decision.reason, DecisionReason::RolesMissing { rule_index: 0 });
    }

    #[test]
    fn test_empty_permissions_forbid() {
        let rules = roles_rules(&MemoryRuleSource::new().section("^x", [("read", "admin")]));
        let decision = rules.evaluate("x", "update", &ctx(&["admin"])).unwrap();
        assert_eq!(
            decision.reason,
            DecisionReason::OperationForbidden { rule_index: 0 }
        );
    }

    #[test]
    fn test_role_granted_reports_role() {
        let rules = roles_rules(&MemoryRuleSource::new().section("^x", [("read", "admin,reader")]));
        let decision = rules.evaluate("x", "read", &ctx(&["reader"])).unwrap();
        assert_eq!(
            decision.reason,
            DecisionReason::RoleGranted {
                rule_index: 0,
                role: "reader".to_string()
            }
        );
    }

    #[test]
    fn test_roles_are_case_sensitive() {
        let rules = roles_rules(&MemoryRuleSource::new().section("^x", [("read", "admin")]));
        assert!(!rules.check("x", "read", &ctx(&["Admin"])).unwrap());
    }

    // -------------------------------------------------------------------------
    // Policies Format
    // -------------------------------------------------------------------------

    #[test]
    fn test_policy_allowed_and_denied() {
        let enforcer = Arc::new(StubEnforcer::granting(&["can_create"]));
        let source = MemoryRuleSource::new()
            .section("^x_.*", [("create", "can_create"), ("read", "can_read")]);
        let rules = PropertyRules::compile(&source, "policies", Some(enforcer.clone())).unwrap();

        let decision = rules.evaluate("x_a", "create", &ctx(&[])).unwrap();
        assert_eq!(
            decision.reason,
            DecisionReason::PolicyAllowed {
                rule_index: 0,
                target: "^x_.*:create".to_string()
            }
        );

        let decision = rules.evaluate("x_a", "read", &ctx(&[])).unwrap();
        assert!(!decision.allowed);
        assert_eq!(
            *enforcer.calls.lock().unwrap(),
            ["^x_.*:create", "^x_.*:read"]
        );
    }

    #[test]
    fn test_policy_empty_permissions_skip_enforcer() {
        let enforcer = Arc::new(StubEnforcer::granting(&["p"]));
        let source = MemoryRuleSource::new().section("^x", [("read", "p")]);
        let rules = PropertyRules::compile(&source, "policies", Some(enforcer.clone())).unwrap();

        assert!(!rules.check("x", "delete", &ctx(&[])).unwrap());
        assert!(enforcer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_enforcer_failure_propagates() {
        let enforcer = Arc::new(StubEnforcer {
            fail: true,
            ..Default::default()
        });
        let source = MemoryRuleSource::new().section("^x", [("read", "p")]);
        let rules = PropertyRules::compile(&source, "policies", Some(enforcer)).unwrap();

        let err = rules.check("x", "read", &ctx(&[])).unwrap_err();
        assert!(matches!(err, EnforcementError::Evaluation { .. }));
    }

    // -------------------------------------------------------------------------
    // Property Sets
    // -------------------------------------------------------------------------

    #[test]
    fn test_readable_and_forbidden_properties() {
        let rules = roles_rules(
            &MemoryRuleSource::new()
                .section("^secret_", [("read", "admin")])
                .section(".*", [("read", "member"), ("update", "member")]),
        );
        let member = ctx(&["member"]);
        let props = ["name", "secret_key", "size"];

        assert_eq!(
            rules.readable_properties(props, &member).unwrap(),
            ["name", "size"]
        );
        assert_eq!(
            rules
                .forbidden_properties(props, Operation::Update, &member)
                .unwrap(),
            ["secret_key"]
        );
        assert!(
            rules
                .forbidden_properties(["name"], Operation::Update, &member)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_reason_serialization() {
        let reason = DecisionReason::RoleGranted {
            rule_index: 2,
            role: "admin".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&reason).unwrap(),
            serde_json::json!({ "code": "role-granted", "ruleIndex": 2, "role": "admin" })
        );
        assert_eq!(reason.to_string(), "rule #2 grants role 'admin'");
    }
}
