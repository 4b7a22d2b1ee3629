//! Observations for logging and metrics.
//!
//! The session never logs by itself. It describes what happened as
//! [`Observation`] values and the runtime hands them, together with the
//! session's [`RoomInfo`], to whatever sink the embedding application uses.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ActionName, Endpoint, LinkId, StateVector};

/// Who and where, attached to every observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomInfo {
    /// Room the session joins.
    pub room_id: String,
    /// Our participant id.
    pub user_id: String,
    /// The other participant's id.
    pub remote_user_id: String,
}

impl fmt::Display for RoomInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}->{}", self.user_id, self.room_id, self.remote_user_id)
    }
}

/// Something worth recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// The state vector changed.
    StateChanged {
        /// Vector before the change.
        previous: StateVector,
        /// Vector after the change.
        current: StateVector,
    },
    /// A rule matched and its action was scheduled.
    ActionDispatched {
        /// Scheduled action.
        action: ActionName,
        /// Index of the matching rule.
        rule: usize,
        /// Delay before it runs.
        delay: Duration,
    },
    /// A scheduled action started running.
    ActionStarted {
        /// Action that started.
        action: ActionName,
    },
    /// A delayed action was dropped because its rule no longer matched.
    ActionSuperseded {
        /// Dropped action.
        action: ActionName,
    },
    /// The watchdog reclaimed an action that ran too long.
    ActionTimedOut {
        /// Reclaimed action.
        action: ActionName,
        /// How long it had been running.
        elapsed: Duration,
    },
    /// The watchdog re-ran reconciliation.
    WatchdogNudge,
    /// A request was rejected or the channel failed underneath it.
    RequestFailed {
        /// Request method.
        method: &'static str,
        /// Server or transport message.
        reason: String,
    },
    /// A response or notification did not have the expected shape.
    ProtocolMismatch {
        /// Method name.
        method: String,
        /// What was wrong.
        detail: String,
    },
    /// Local media was acquired.
    MediaAcquired {
        /// Whether video had to be given up.
        audio_only: bool,
    },
    /// Video capture failed; retrying with audio only.
    MediaDegraded {
        /// Why video capture failed.
        reason: String,
    },
    /// No media could be acquired at all. The session gives up.
    MediaUnavailable {
        /// Why audio capture failed.
        reason: String,
    },
    /// A link was created.
    LinkCreated {
        /// New link.
        link: LinkId,
    },
    /// A link was destroyed.
    LinkDestroyed {
        /// Destroyed link.
        link: LinkId,
    },
    /// An event arrived for a link that has since been replaced.
    StaleLinkEvent {
        /// The stale link.
        link: LinkId,
        /// Event kind.
        event: &'static str,
    },
    /// A candidate arrived for an endpoint name we do not know.
    UnknownEndpoint {
        /// Name carried by the candidate.
        name: String,
    },
    /// A surface started rendering.
    PlaybackStarted {
        /// Surface side.
        endpoint: Endpoint,
    },
    /// A surface failed to render.
    PlaybackFailed {
        /// Surface side.
        endpoint: Endpoint,
        /// Renderer message.
        reason: String,
    },
    /// The session was closed.
    SessionClosed,
    /// The session was restarted from scratch.
    SessionRestarted,
}

impl Observation {
    /// Stable snake_case name, suitable as a metric or log key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::ActionDispatched { .. } => "action_dispatched",
            Self::ActionStarted { .. } => "action_started",
            Self::ActionSuperseded { .. } => "action_superseded",
            Self::ActionTimedOut { .. } => "action_timed_out",
            Self::WatchdogNudge => "watchdog_nudge",
            Self::RequestFailed { .. } => "request_failed",
            Self::ProtocolMismatch { .. } => "protocol_mismatch",
            Self::MediaAcquired { .. } => "media_acquired",
            Self::MediaDegraded { .. } => "media_degraded",
            Self::MediaUnavailable { .. } => "media_unavailable",
            Self::LinkCreated { .. } => "link_created",
            Self::LinkDestroyed { .. } => "link_destroyed",
            Self::StaleLinkEvent { .. } => "stale_link_event",
            Self::UnknownEndpoint { .. } => "unknown_endpoint",
            Self::PlaybackStarted { .. } => "playback_started",
            Self::PlaybackFailed { .. } => "playback_failed",
            Self::SessionClosed => "session_closed",
            Self::SessionRestarted => "session_restarted",
        }
    }

    /// Whether this indicates something went wrong.
    pub fn is_problem(&self) -> bool {
        matches!(
            self,
            Self::ActionTimedOut { .. }
                | Self::RequestFailed { .. }
                | Self::ProtocolMismatch { .. }
                | Self::MediaDegraded { .. }
                | Self::MediaUnavailable { .. }
                | Self::UnknownEndpoint { .. }
                | Self::PlaybackFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case() {
        let observation =
            Observation::ActionTimedOut { action: ActionName::Connect, elapsed: Duration::ZERO };
        assert_eq!(observation.name(), "action_timed_out");
        assert!(observation.is_problem());
        assert!(!Observation::SessionClosed.is_problem());
    }

    #[test]
    fn room_info_display() {
        let info = RoomInfo { room_id: "r".into(), user_id: "alice".into(), remote_user_id: "bob".into() };
        assert_eq!(info.to_string(), "alice@r->bob");
    }
}
