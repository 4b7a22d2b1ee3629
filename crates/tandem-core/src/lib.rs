//! Tandem session core logic
//!
//! Pure data model and decision logic for a two-party media session,
//! completely decoupled from I/O. Nothing in this crate talks to a network,
//! a camera or a clock: callers pass in what they observed and get back a
//! description of what should happen next.
//!
//! # Architecture
//!
//! A session's health is described by a single [`StateVector`] spanning the
//! signaling channel, room membership, the local publishing link and the
//! remote receiving link. The vector changes only through [`StateUpdate`]
//! records applied in one place.
//!
//! Progress is driven by a [`RuleTable`]: an ordered list of [`Rule`]s, each
//! matching a set of accepted values per field and naming the action that
//! moves the session forward (or repairs it). Evaluating the table against a
//! vector yields [`Dispatch`]es. Rules are ordered repair-before-progress, and
//! an exclusive rule that matches stops the scan so later pipeline stages are
//! not advanced while an earlier stage still needs repair.
//!
//! ```text
//!   signaling ──> room ──> local link
//!                    └───> remote link ──> presentation
//! ```
//!
//! Scheduling, guards and collaborator handling live one layer up in
//! `tandem-client`.
//!
//! # Components
//!
//! - [`state`]: State vector, field enums, partial updates
//! - [`matcher`]: Closed accepted-value sets
//! - [`rules`]: Rules, the rule table, reconciliation pass
//! - [`config`]: Session configuration and timing defaults
//! - [`observe`]: Observations emitted for logging and metrics
//! - [`types`]: Endpoints, link identities, media handles
//! - [`error`]: Configuration and rule table errors

pub mod config;
pub mod error;
pub mod matcher;
pub mod observe;
pub mod rules;
pub mod state;
pub mod types;

pub use config::{IceServer, MediaConstraints, SessionConfig, Timing, TrackFlags, VideoConstraints};
pub use error::{ConfigError, RuleTableError};
pub use matcher::{ChannelStates, LinkStates, Matchers};
pub use observe::{Observation, RoomInfo};
pub use rules::{ActionName, Dispatch, Rule, RuleDelay, RuleTable};
pub use state::{ChannelState, Changes, LinkState, RemotePeer, StateUpdate, StateVector};
pub use types::{Endpoint, LinkConfig, LinkId, LinkLifecycle, LinkRole, MediaHandle, TrackKind};
