//! # propguard
//!
//! Property protection for managed resources.
//!
//! Given the name of a resource attribute, an operation (create, read,
//! update or delete) and the requester's security context, the engine in
//! this crate decides whether that operation on that attribute is permitted.
//!
//! ## Overview
//!
//! A protection file lists one section per property expression (a regular
//! expression searched within property names). Each section names who may
//! perform each operation, either as role names or as a single delegated
//! policy name, depending on the configured rule format:
//!
//! ```toml
//! ["^x_owner_.*"]
//! create = "admin,member"
//! read = "admin,member,reader"
//! update = "admin"
//! delete = "admin"
//! ```
//!
//! Sections are evaluated in file order and the first matching section
//! decides. An engine with no sections at all allows everything; once any
//! section exists, properties no section matches are denied.
//!
//! ## Modules
//!
//! - [`config`] - Protection settings
//! - [`context`] - Requester security context
//! - [`enforcer`] - External policy enforcer boundary and rule registration
//! - [`engine`] - Per-request decisions
//! - [`error`] - Load-time and enforcement error types
//! - [`operation`] - Operations and rule formats
//! - [`reload`] - Hot-reload holder and file watcher
//! - [`rules`] - Compiling a protection file into a ruleset
//! - [`source`] - Ordered protection file sources
//!
//! ## Example
//!
//! ```ignore
//! use propguard::{MemoryRuleSource, PropertyRules, RequestContext};
//!
//! let source = MemoryRuleSource::new()
//!     .section("^img_.*", [("create", "admin,creator")]);
//! let rules = PropertyRules::compile(&source, "roles", None)?;
//!
//! let ctx = RequestContext::new().with_role("creator");
//! assert!(rules.check("img_kernel", "create", &ctx)?);
//! ```

pub mod config;
pub mod context;
pub mod enforcer;
pub mod engine;
pub mod error;
pub mod operation;
pub mod reload;
pub mod rules;
pub mod source;

pub use config::ProtectionConfig;
pub use context::RequestContext;
pub use enforcer::{PolicyEnforcer, PolicyRule, PolicyVerdict, policy_target};
pub use engine::{DecisionReason, PropertyDecision};
pub use error::{EnforcementError, RuleConfigError, UnknownOperation};
pub use operation::{Operation, RuleFormat};
pub use reload::{ReloadStats, ReloadablePropertyRules, WatchError, WatcherConfig, WatcherHandle};
pub use rules::{Permissions, PropertyRule, PropertyRules};
pub use source::{MemoryRuleSource, RuleSource, TomlRuleSource};
