//! Error types for configuration and rule tables.

use thiserror::Error;

/// Invalid session configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required identifier was empty.
    #[error("{0} must not be empty")]
    MissingField(&'static str),

    /// Local and remote participant ids are the same.
    #[error("local and remote participant are both `{0}`")]
    SameParticipant(String),

    /// A timing interval that must be positive was zero.
    #[error("timing.{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Invalid rule table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleTableError {
    /// The table has no rules.
    #[error("rule table is empty")]
    Empty,

    /// A rule constrains a field to an empty set, so it can never match.
    #[error("rule {rule}: `{field}` accepts no value")]
    EmptyMatcher {
        /// Index of the offending rule.
        rule: usize,
        /// Field with the empty set.
        field: &'static str,
    },

    /// A rule backs off but the backoff interval is zero.
    #[error("rule {rule}: backoff delay with a zero backoff interval")]
    ZeroBackoff {
        /// Index of the offending rule.
        rule: usize,
    },
}
