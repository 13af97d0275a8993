//! Namespace tokens and namespace-qualified table names

use serde::Serialize;
use std::fmt;

/// Longest namespace token spliced into a table name.
const MAX_TOKEN_LEN: usize = 32;

/// Token used when an account name sanitizes to nothing. Maps to unsuffixed tables.
const DEFAULT_TOKEN: &str = "default";

/// Storage namespace derived from a target account.
///
/// The inner token only ever contains `[a-z0-9_]`, which is what makes it safe
/// to use inside SQL identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Namespace(String);

impl Namespace {
    /// Normalize an account name (or an explicit namespace) into a token.
    ///
    /// Lowercases, collapses each run of non-alphanumeric characters into one
    /// underscore, drops separators at either end and truncates.
    pub fn new(raw: &str) -> Self {
        let mut token = String::with_capacity(raw.len().min(MAX_TOKEN_LEN));
        let mut separator = false;

        for ch in raw.chars() {
            if ch.is_ascii_alphanumeric() {
                if separator && !token.is_empty() {
                    token.push('_');
                }
                separator = false;
                token.push(ch.to_ascii_lowercase());
            } else {
                separator = true;
            }
        }

        token.truncate(MAX_TOKEN_LEN);
        let token = token.trim_end_matches('_');

        if token.is_empty() {
            Self::default()
        } else {
            Self(token.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TOKEN
    }

    /// Suffix appended to table names, `None` for the default namespace.
    pub fn table_suffix(&self) -> Option<&str> {
        if self.is_default() {
            None
        } else {
            Some(&self.0)
        }
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(DEFAULT_TOKEN.to_string())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete table identifiers for one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tables {
    pub repositories: String,
    pub languages: String,
    pub contributors: String,
    pub commit_activity: String,
    pub pull_requests: String,
    pub aggregates: String,
}

impl Tables {
    pub fn for_namespace(namespace: &Namespace) -> Self {
        let qualify = |base: &str| match namespace.table_suffix() {
            Some(suffix) => format!("{}_{}", base, suffix),
            None => base.to_string(),
        };

        Self {
            repositories: qualify("repositories"),
            languages: qualify("languages"),
            contributors: qualify("contributors"),
            commit_activity: qualify("commit_activity"),
            pull_requests: qualify("pull_requests"),
            aggregates: qualify("aggregates"),
        }
    }
}
