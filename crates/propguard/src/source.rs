//! Protection file sources.
//!
//! A source exposes the protection file as an ordered list of sections, each
//! named by a property expression, with a lookup of raw string values per
//! key. Section order is significant and must be kept exactly as written.
//!
//! - [`TomlRuleSource`] - reads a TOML protection file
//! - [`MemoryRuleSource`] - ordered in-memory sections

use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, error, warn};

use crate::error::RuleConfigError;
use crate::operation::Operation;

/// Ordered sections of a protection file.
pub trait RuleSource {
    /// Name of this source (for logging and errors).
    fn name(&self) -> &str;

    /// Section names (property expressions) in file order.
    fn sections(&self) -> Vec<&str>;

    /// Raw value of `key` in the section at `index` (file order), if present.
    fn value(&self, index: usize, key: &str) -> Option<&str>;
}

/// One section of a protection file.
#[derive(Debug, Clone, Default)]
struct Section {
    expression: String,
    values: HashMap<String, String>,
}

fn find<'a>(sections: &'a [Section], index: usize, key: &str) -> Option<&'a str> {
    sections
        .get(index)
        .and_then(|s| s.values.get(key))
        .map(String::as_str)
}

// =============================================================================
// TOML Source
// =============================================================================

/// Protection file in TOML.
///
/// Every top-level table is a section; quote the header when the
/// expression contains characters TOML does not allow in bare keys:
///
/// ```toml
/// ["^x_owner_.*"]
/// create = "admin,member"
/// read = ["admin", "member", "reader"]
/// ```
///
/// Values are strings or arrays of strings; arrays are joined with commas.
#[derive(Debug, Clone)]
pub struct TomlRuleSource {
    name: String,
    sections: Vec<Section>,
}

impl TomlRuleSource {
    /// Read and parse a protection file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RuleConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| {
            error!(path = %path.display(), error = %source, "Couldn't read property protection file");
            RuleConfigError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(path = %path.display(), "Read property protection file");
        Self::parse(path.display().to_string(), &content)
    }

    /// Parse protection file content.
    ///
    /// `name` identifies the content in errors and logs.
    pub fn parse(name: impl Into<String>, content: &str) -> Result<Self, RuleConfigError> {
        let name = name.into();
        let table = toml::from_str::<toml::Table>(content).map_err(|e| {
            error!(source_name = %name, error = %e, "Malformed property protection file");
            RuleConfigError::Parse {
                source_name: name.clone(),
                message: e.message().to_string(),
            }
        })?;

        let mut sections = Vec::with_capacity(table.len());
        for (expression, entry) in table {
            let toml::Value::Table(entries) = entry else {
                return Err(RuleConfigError::InvalidSection {
                    source_name: name,
                    section: expression,
                });
            };

            let mut values = HashMap::with_capacity(entries.len());
            for (key, value) in entries {
                if value.is_table() {
                    return Err(RuleConfigError::InvalidValue {
                        section: expression,
                        key,
                    });
                }
                if key.parse::<Operation>().is_err() {
                    warn!(
                        rule = %expression,
                        key = %key,
                        "Ignoring unrecognized key in property protection rule"
                    );
                    continue;
                }
                let raw = raw_value(&value).ok_or_else(|| RuleConfigError::InvalidValue {
                    section: expression.clone(),
                    key: key.clone(),
                })?;
                values.insert(key, raw);
            }

            sections.push(Section { expression, values });
        }

        Ok(Self { name, sections })
    }
}

fn raw_value(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| item.as_str())
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join(",")),
        _ => None,
    }
}

impl RuleSource for TomlRuleSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn sections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.expression.as_str()).collect()
    }

    fn value(&self, index: usize, key: &str) -> Option<&str> {
        find(&self.sections, index, key)
    }
}

// =============================================================================
// In-Memory Source
// =============================================================================

/// Protection rules built in code.
///
/// ```ignore
/// let source = MemoryRuleSource::new()
///     .section("^img_.*", [("create", "admin"), ("read", "admin,member")])
///     .section(".*", [("read", "admin")]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRuleSource {
    sections: Vec<Section>,
}

impl MemoryRuleSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a section with the given key/value entries.
    #[must_use]
    pub fn section<I, K, V>(mut self, expression: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.sections.push(Section {
            expression: expression.into(),
            values: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        });
        self
    }
}

impl RuleSource for MemoryRuleSource {
    fn name(&self) -> &str {
        "memory"
    }

    fn sections(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.expression.as_str()).collect()
    }

    fn value(&self, index: usize, key: &str) -> Option<&str> {
        find(&self.sections, index, key)
    }
}
