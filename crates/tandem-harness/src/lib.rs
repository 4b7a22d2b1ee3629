//! Deterministic simulation harness for Tandem sessions.
//!
//! Runs a real [`tandem_client::Session`] against in-memory collaborators on
//! a virtual clock, with seeded latency and scripted faults, for
//! deterministic, reproducible testing of recovery behaviour.

pub mod fault;
pub mod model;
pub mod scenario;
pub mod sim;
pub mod world;

pub use fault::{Fault, FaultParseError, FaultPlan, ScheduledFault};
pub use model::{Operation, expected_dispatches};
pub use sim::Simulation;
pub use world::{SimWorld, WorldStats};
