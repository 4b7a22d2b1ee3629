//! Observability sinks.

use tandem_core::{Observation, RoomInfo};
use tracing::{debug, info, warn};

/// Receives every observation a session emits, with its room context.
pub trait ObservabilitySink: Send {
    /// Record one observation.
    fn emit(&mut self, room: &RoomInfo, observation: &Observation);
}

/// Forwards observations to `tracing`.
///
/// Problems are logged at `warn`, state changes and lifecycle milestones at
/// `info`, everything else at `debug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn emit(&mut self, room: &RoomInfo, observation: &Observation) {
        let event = observation.name();
        let room_id = room.room_id.as_str();
        let user = room.user_id.as_str();
        let remote = room.remote_user_id.as_str();

        match observation {
            Observation::StateChanged { current, .. } => {
                info!(event, room_id, user, remote, state = %current, "state changed");
            },
            Observation::ActionDispatched { action, rule, delay } => {
                debug!(event, room_id, user, remote, %action, rule, ?delay, "action dispatched");
            },
            Observation::SessionClosed
            | Observation::SessionRestarted
            | Observation::MediaAcquired { .. } => {
                info!(event, room_id, user, remote, ?observation, "session");
            },
            other if other.is_problem() => {
                warn!(event, room_id, user, remote, observation = ?other, "session problem");
            },
            other => debug!(event, room_id, user, remote, observation = ?other, "session"),
        }
    }
}

/// Keeps every observation in memory.
impl ObservabilitySink for Vec<Observation> {
    fn emit(&mut self, _room: &RoomInfo, observation: &Observation) {
        self.push(observation.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_records() {
        let room =
            RoomInfo { room_id: "r".into(), user_id: "alice".into(), remote_user_id: "bob".into() };
        let mut sink = Vec::new();
        sink.emit(&room, &Observation::SessionClosed);
        TracingSink.emit(&room, &Observation::WatchdogNudge);
        assert_eq!(sink, vec![Observation::SessionClosed]);
    }
}
