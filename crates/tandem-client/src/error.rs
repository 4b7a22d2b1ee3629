//! Session construction errors.

use tandem_core::{ConfigError, RuleTableError};
use thiserror::Error;

/// Why a session could not be created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The configuration is invalid.
    #[error("invalid session config: {0}")]
    Config(#[from] ConfigError),

    /// The rule table is invalid.
    #[error("invalid rule table: {0}")]
    RuleTable(#[from] RuleTableError),
}
