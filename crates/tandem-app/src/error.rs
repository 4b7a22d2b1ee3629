//! Runtime errors.

use thiserror::Error;

/// Errors surfaced by the runtime handle.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeError {
    /// The runtime has returned; control commands go nowhere.
    #[error("runtime is not running")]
    Stopped,
}
