//! Property protection error types.
//!
//! Load-time problems with a protection file are [`RuleConfigError`]s and
//! abort construction of the whole ruleset. Failures of the external policy
//! enforcer that are not an allow/deny verdict are [`EnforcementError`]s and
//! are propagated to the caller of a decision.

use std::path::PathBuf;

use crate::operation::Operation;

/// Errors that prevent a ruleset from being built.
#[derive(Debug, thiserror::Error)]
pub enum RuleConfigError {
    /// Protection was requested but no protection file is configured.
    #[error("No property protection file configured")]
    MissingFile,

    /// The protection file could not be read.
    #[error("Couldn't find property protection file {}: {source}", .path.display())]
    Unreadable {
        /// The configured file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The protection file is not well-formed.
    #[error("Couldn't parse property protection file {source_name}: {message}")]
    Parse {
        /// Name of the source (usually the file path).
        source_name: String,
        /// Parser message.
        message: String,
    },

    /// A top-level entry of the protection file is not a section.
    #[error("Entry '{section}' in {source_name} is not a property protection section")]
    InvalidSection {
        /// Name of the source (usually the file path).
        source_name: String,
        /// The offending entry name.
        section: String,
    },

    /// An operation entry holds something other than a string or list of strings.
    #[error("Value of '{key}' for rule {section} must be a string or a list of strings")]
    InvalidValue {
        /// The section (property expression).
        section: String,
        /// The offending key.
        key: String,
    },

    /// The rule format setting is neither `roles` nor `policies`.
    #[error(
        "Invalid value '{value}' for 'rule_format'. The permitted values are 'roles' and 'policies'"
    )]
    InvalidRuleFormat {
        /// The configured value.
        value: String,
    },

    /// A section name is not a valid regular expression.
    #[error("Encountered a malformed property protection rule {pattern}: {source}")]
    MalformedPattern {
        /// The property expression as written.
        pattern: String,
        /// The regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// Policy format allows a single policy per operation.
    #[error(
        "Multiple policies '{value}' not allowed for operation {operation} of rule {pattern}. \
         Policies can be combined in the policy file"
    )]
    MultiplePolicies {
        /// The property expression as written.
        pattern: String,
        /// The operation carrying the list.
        operation: Operation,
        /// The raw configured value.
        value: String,
    },

    /// Policy format was selected but no policy enforcer was supplied.
    #[error("Rule format 'policies' requires a policy enforcer")]
    MissingEnforcer,
}

/// Failures of the policy enforcer that are not an authorization verdict.
#[derive(Debug, thiserror::Error)]
pub enum EnforcementError {
    /// The enforcer has no rule registered under the requested target.
    #[error("Unknown policy target: {target}")]
    UnknownTarget {
        /// The qualified `<expression>:<operation>` name.
        target: String,
    },

    /// The enforcer failed while evaluating a rule.
    #[error("Policy evaluation failed: {message}")]
    Evaluation {
        /// Description of the failure.
        message: String,
    },
}

impl EnforcementError {
    /// Creates a new `UnknownTarget` error.
    #[must_use]
    pub fn unknown_target(target: impl Into<String>) -> Self {
        Self::UnknownTarget {
            target: target.into(),
        }
    }

    /// Creates a new `Evaluation` error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }
}

/// An action name outside the fixed operation set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operation: {operation}")]
pub struct UnknownOperation {
    /// The unrecognized action name.
    pub operation: String,
}
