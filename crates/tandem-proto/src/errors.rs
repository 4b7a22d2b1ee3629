//! Protocol error types.

use thiserror::Error;

/// Convenience alias for results carrying a [`ProtocolError`].
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while interpreting signaling messages.
///
/// All of these mean the server sent something we do not understand. None of
/// them are fatal: callers log the error and treat the exchange as failed.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A response or notification lacked a required field.
    #[error("{method}: missing field `{field}`")]
    MissingField {
        /// Method or notification name.
        method: String,
        /// Name of the absent field.
        field: &'static str,
    },

    /// Parameters were present but had the wrong shape.
    #[error("{method}: malformed payload: {source}")]
    Malformed {
        /// Method or notification name.
        method: String,
        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The server pushed a notification we have no handler for.
    #[error("unknown notification `{0}`")]
    UnknownNotification(String),
}

impl ProtocolError {
    /// Method or notification the error is about.
    pub fn method(&self) -> &str {
        match self {
            Self::MissingField { method, .. } | Self::Malformed { method, .. } => method,
            Self::UnknownNotification(method) => method,
        }
    }

    pub(crate) fn malformed(method: &str, source: serde_json::Error) -> Self {
        Self::Malformed { method: method.to_string(), source }
    }

    pub(crate) fn missing(method: &str, field: &'static str) -> Self {
        Self::MissingField { method: method.to_string(), field }
    }
}
