//! Reference model for property tests.
//!
//! [`expected_dispatches`] restates the default reconciliation policy as
//! plain control flow, independent of the rule table, so property tests can
//! compare the two on arbitrary state vectors. [`Operation`] is the
//! vocabulary random simulation runs are generated from.

use std::time::Duration;

use tandem_app::{Control, ObservabilitySink};
use tandem_core::{ActionName, ChannelState, Endpoint, LinkState, StateVector, TrackKind};

use crate::{Fault, Simulation};

/// What the default table should dispatch for `state`, with resolved delays,
/// in table order.
pub fn expected_dispatches(state: &StateVector, backoff: Duration) -> Vec<(ActionName, Duration)> {
    match state.signal() {
        ChannelState::Unset => return vec![(ActionName::InitConnection, Duration::ZERO)],
        ChannelState::Disconnected => return vec![(ActionName::InitConnection, backoff)],
        ChannelState::Connecting => return Vec::new(),
        ChannelState::Connected => {},
    }

    match state.room() {
        ChannelState::Unset => return vec![(ActionName::Connect, Duration::ZERO)],
        ChannelState::Disconnected => return vec![(ActionName::Connect, backoff)],
        ChannelState::Connecting => return Vec::new(),
        ChannelState::Connected => {},
    }

    let mut expected = Vec::new();
    match state.local_link() {
        LinkState::Unset => expected.push((ActionName::PublishLocal, Duration::ZERO)),
        LinkState::Failed | LinkState::Disconnected => {
            expected.push((ActionName::PublishLocal, backoff));
        },
        LinkState::Connecting | LinkState::Connected => {},
    }

    if state.remote_present() {
        match state.remote_link() {
            LinkState::Unset | LinkState::Failed | LinkState::Disconnected => {
                expected.push((ActionName::ReceiveRemote, Duration::ZERO));
            },
            LinkState::Connected if !state.remote_playing() => {
                expected.push((ActionName::PresentRemote, Duration::ZERO));
            },
            LinkState::Connecting | LinkState::Connected => {},
        }
    }

    expected
}

/// One step of a generated simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Let virtual time pass.
    Advance {
        /// How long, in milliseconds.
        millis: u64,
    },
    /// Something goes wrong outside the session.
    Inject(Fault),
    /// Ask for a reconciliation pass.
    Nudge,
    /// Toggle a track.
    ToggleTrack {
        /// Which side.
        endpoint: Endpoint,
        /// Which track.
        kind: TrackKind,
        /// New state.
        enabled: bool,
    },
    /// Close the session and immediately restart it.
    Bounce,
}

impl Operation {
    /// Apply the operation to `sim`.
    pub fn apply<S: ObservabilitySink>(self, sim: &mut Simulation<S>) {
        match self {
            Self::Advance { millis } => sim.run_for(Duration::from_millis(millis)),
            Self::Inject(fault) => sim.inject(fault),
            Self::Nudge => sim.control(Control::Nudge),
            Self::ToggleTrack { endpoint, kind, enabled } => {
                sim.control(Control::SetTrackEnabled { endpoint, kind, enabled });
            },
            Self::Bounce => {
                sim.control(Control::Close);
                sim.control(Control::Restart);
            },
        }
    }
}
