//! Compiling protection files into rulesets.
//!
//! Each section of a protection file becomes one [`PropertyRule`]: its name
//! is compiled as a regular expression searched within property names, and
//! each of the four operations gets the list of permission tokens that grant
//! it. Missing operations get an empty list, which nobody satisfies.
//!
//! Compilation is all-or-nothing. Any malformed input fails with a
//! [`RuleConfigError`] and no ruleset is produced.
//!
//! # Example
//!
//! ```ignore
//! use propguard::{PropertyRules, TomlRuleSource};
//!
//! let source = TomlRuleSource::from_path("property-protections.toml")?;
//! let rules = PropertyRules::compile(&source, "roles", None)?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use tracing::{error, info, warn};

use crate::config::ProtectionConfig;
use crate::enforcer::{PolicyEnforcer, PolicyRule, policy_target, register_policy_rules};
use crate::error::RuleConfigError;
use crate::operation::{Operation, RuleFormat};
use crate::source::{RuleSource, TomlRuleSource};

// =============================================================================
// Permissions
// =============================================================================

/// Permission tokens for every operation of one rule.
///
/// In `roles` format the tokens are role names. In `policies` format each
/// operation carries at most one token, the policy name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions {
    tokens: [Vec<String>; 4],
}

impl Permissions {
    /// Tokens granting `operation`. Empty means nobody is granted it.
    #[must_use]
    pub fn get(&self, operation: Operation) -> &[String] {
        &self.tokens[operation.index()]
    }

    /// Iterate over all operations with their tokens, in file order.
    pub fn iter(&self) -> impl Iterator<Item = (Operation, &[String])> {
        Operation::ALL.into_iter().map(|op| (op, self.get(op)))
    }

    fn set(&mut self, operation: Operation, tokens: Vec<String>) {
        self.tokens[operation.index()] = tokens;
    }
}

// =============================================================================
// Property Rule
// =============================================================================

/// A compiled protection file section.
#[derive(Debug, Clone)]
pub struct PropertyRule {
    pattern: Regex,
    permissions: Permissions,
}

impl PropertyRule {
    /// The compiled property expression.
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Permission tokens per operation.
    #[must_use]
    pub fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Returns `true` if the expression is found anywhere in `property`.
    #[must_use]
    pub fn matches(&self, property: &str) -> bool {
        self.pattern.is_match(property)
    }
}

// =============================================================================
// Property Rules
// =============================================================================

/// An immutable, ordered property protection ruleset.
///
/// Built once by [`PropertyRules::compile`]; reconfiguration builds a new
/// instance. Decisions are made with [`PropertyRules::check`].
pub struct PropertyRules {
    pub(crate) rules: Vec<PropertyRule>,
    pub(crate) rule_format: RuleFormat,
    /// Rule position to the expression as written (policy format only).
    pub(crate) expressions: HashMap<usize, String>,
    pub(crate) enforcer: Option<Arc<dyn PolicyEnforcer>>,
}

impl PropertyRules {
    /// Compile a ruleset from an ordered source.
    ///
    /// `rule_format` must be `roles` or `policies` (any case). In `policies`
    /// format an enforcer is required; every operation naming a policy is
    /// registered with it as `<expression>:<operation>`.
    pub fn compile(
        source: &dyn RuleSource,
        rule_format: &str,
        enforcer: Option<Arc<dyn PolicyEnforcer>>,
    ) -> Result<Self, RuleConfigError> {
        let rule_format = RuleFormat::parse(rule_format).inspect_err(|e| error!("{e}"))?;

        if rule_format == RuleFormat::Policies && enforcer.is_none() {
            let err = RuleConfigError::MissingEnforcer;
            error!("{err}");
            return Err(err);
        }

        let sections = source.sections();
        let mut rules = Vec::with_capacity(sections.len());
        let mut expressions = HashMap::new();
        let mut policy_rules = HashMap::new();

        for (index, expression) in sections.into_iter().enumerate() {
            let pattern = compile_pattern(expression)?;
            let mut permissions = Permissions::default();

            for operation in Operation::ALL {
                let raw = source.value(index, operation.as_str()).unwrap_or("");
                if raw.trim().is_empty() {
                    warn!(
                        operation = %operation,
                        rule = %expression,
                        "Property protection on operation for rule is not found. \
                         No role will be allowed to perform this operation"
                    );
                    continue;
                }

                let tokens = match rule_format {
                    RuleFormat::Roles => raw
                        .split(',')
                        .map(str::trim)
                        .filter(|role| !role.is_empty())
                        .map(str::to_string)
                        .collect(),
                    RuleFormat::Policies => {
                        if raw.contains(',') {
                            let err = RuleConfigError::MultiplePolicies {
                                pattern: expression.to_string(),
                                operation,
                                value: raw.to_string(),
                            };
                            error!("{err}");
                            return Err(err);
                        }
                        let policy = raw.trim();
                        policy_rules.insert(
                            policy_target(expression, operation),
                            PolicyRule::delegate(policy),
                        );
                        expressions.insert(index, expression.to_string());
                        vec![policy.to_string()]
                    }
                };
                permissions.set(operation, tokens);
            }

            rules.push(PropertyRule {
                pattern,
                permissions,
            });
        }

        // Nothing reaches the enforcer unless every section compiled
        if let Some(enforcer) = &enforcer {
            register_policy_rules(enforcer.as_ref(), policy_rules);
        }

        info!(
            source = source.name(),
            rules = rules.len(),
            rule_format = %rule_format,
            "Loaded property protection rules"
        );

        Ok(Self {
            rules,
            rule_format,
            expressions,
            enforcer,
        })
    }

    /// Read the configured protection file and compile it.
    pub fn from_config(
        config: &ProtectionConfig,
        enforcer: Option<Arc<dyn PolicyEnforcer>>,
    ) -> Result<Self, RuleConfigError> {
        let file = config
            .file
            .as_ref()
            .filter(|_| config.is_enabled())
            .ok_or(RuleConfigError::MissingFile)?;
        let source = TomlRuleSource::from_path(file)?;
        Self::compile(&source, &config.rule_format, enforcer)
    }

    /// Compiled rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[PropertyRule] {
        &self.rules
    }

    /// The rule format the ruleset was compiled with.
    #[must_use]
    pub fn rule_format(&self) -> RuleFormat {
        self.rule_format
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if the ruleset has no rules (protection disabled).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The property expression, exactly as written, of the rule at `index`.
    ///
    /// Only rules that registered at least one policy have an entry.
    #[must_use]
    pub fn policy_expression(&self, index: usize) -> Option<&str> {
        self.expressions.get(&index).map(String::as_str)
    }
}

impl fmt::Debug for PropertyRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyRules")
            .field("rules", &self.rules)
            .field("rule_format", &self.rule_format)
            .field("expressions", &self.expressions)
            .field("has_enforcer", &self.enforcer.is_some())
            .finish()
    }
}

fn compile_pattern(expression: &str) -> Result<Regex, RuleConfigError> {
    Regex::new(expression).map_err(|source| {
        let err = RuleConfigError::MalformedPattern {
            pattern: expression.to_string(),
            source,
        };
        error!("{err}");
        err
    })
}
