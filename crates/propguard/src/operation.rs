//! Operations and rule formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RuleConfigError, UnknownOperation};

// =============================================================================
// Operation
// =============================================================================

/// Operations a protection rule can grant on a property.
///
/// The set is closed: any other action name is never recognized and is
/// always denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Add the property to a resource.
    Create,
    /// See the property on a resource.
    Read,
    /// Change the property's value.
    Update,
    /// Remove the property from a resource.
    Delete,
}

impl Operation {
    /// All operations, in protection file order.
    pub const ALL: [Operation; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// The key naming this operation in a protection file section.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Create => 0,
            Self::Read => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(UnknownOperation {
                operation: other.to_string(),
            }),
        }
    }
}

// =============================================================================
// Rule Format
// =============================================================================

/// How permission tokens in a protection file are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleFormat {
    /// Tokens are role names matched against the requester's roles.
    Roles,
    /// Each operation names a single policy evaluated by the policy enforcer.
    Policies,
}

impl RuleFormat {
    /// Parse a configured rule format, ignoring case.
    pub fn parse(value: &str) -> Result<Self, RuleConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "roles" => Ok(Self::Roles),
            "policies" => Ok(Self::Policies),
            _ => Err(RuleConfigError::InvalidRuleFormat {
                value: value.to_string(),
            }),
        }
    }

    /// Returns the canonical lowercase spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roles => "roles",
            Self::Policies => "policies",
        }
    }
}

impl fmt::Display for RuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_round_trips_through_str() {
        for op in Operation::ALL {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_operation_rejects_unknown_and_mixed_case() {
        assert!("execute".parse::<Operation>().is_err());
        assert!("Read".parse::<Operation>().is_err());
        assert!("".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_indices_are_distinct() {
        let mut seen = [false; 4];
        for op in Operation::ALL {
            assert!(!seen[op.index()]);
            seen[op.index()] = true;
        }
    }

    #[test]
    fn test_rule_format_parse_is_case_insensitive() {
        assert_eq!(RuleFormat::parse("roles").unwrap(), RuleFormat::Roles);
        assert_eq!(RuleFormat::parse("ROLES").unwrap(), RuleFormat::Roles);
        assert_eq!(RuleFormat::parse("Policies").unwrap(), RuleFormat::Policies);
    }

    #[test]
    fn test_rule_format_parse_rejects_other_values() {
        let err = RuleFormat::parse("acl").unwrap_err();
        assert!(matches!(err, RuleConfigError::InvalidRuleFormat { ref value } if value == "acl"));
        assert!(RuleFormat::parse("role").is_err());
        assert!(RuleFormat::parse("").is_err());
    }
}
