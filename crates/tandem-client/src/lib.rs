//! Tandem session state machine
//!
//! Action-based, sans-IO implementation of a two-party media session. The
//! [`Session`] consumes [`SessionEvent`]s reported by its collaborators
//! (media capture, signaling channel, transport links, presentation
//! surfaces) and returns [`SessionAction`]s describing what those
//! collaborators should do next. Time is passed in; nothing here blocks,
//! spawns or performs I/O.
//!
//! The decision of *what* to do next belongs to the rule table in
//! `tandem-core`. This crate owns everything around it: the single mutation
//! entry point, the work queue, timers, per-action guards, action bodies and
//! event handlers.
//!
//! # Components
//!
//! - [`Session`]: The state machine and its entry points
//! - [`SessionEvent`]: Collaborator reports
//! - [`SessionAction`]: Collaborator commands and observations
//! - [`Guard`]: Per-action progress

mod action;
mod actions;
mod error;
mod event;
mod guard;
mod handlers;
mod links;
mod requests;
mod roster;
mod session;
mod timers;

pub use action::SessionAction;
pub use error::SessionError;
pub use event::SessionEvent;
pub use guard::Guard;
pub use session::{Session, SessionStatus};
