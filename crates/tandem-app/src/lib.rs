//! Application layer for Tandem
//!
//! Generic async runtime that runs a [`tandem_client::Session`] against
//! platform collaborators, enabling deterministic tests with the same code
//! that runs in production.
//!
//! # Components
//!
//! - [`Driver`]: Trait for platform-specific collaborator I/O
//! - [`Runtime`]: Generic orchestration loop using Driver
//! - [`RuntimeHandle`]: Control commands for a running session
//! - [`ObservabilitySink`]: Destination for session observations

mod driver;
mod error;
mod runtime;
mod sink;

pub use driver::Driver;
pub use error::RuntimeError;
pub use runtime::{Control, Exit, Runtime, RuntimeHandle};
pub use sink::{ObservabilitySink, TracingSink};
