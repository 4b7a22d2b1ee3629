//! Accepted-value sets for rule matching.
//!
//! Each constrained field of a rule names the exact set of values it accepts.
//! Sets are bitflags over the field's enum, so they are closed by
//! construction: a matcher can only mention values the field can take.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{ChannelState, LinkState, StateVector};

bitflags! {
    /// A set of [`ChannelState`] values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct ChannelStates: u8 {
        /// [`ChannelState::Unset`]
        const UNSET = 1 << 0;
        /// [`ChannelState::Connecting`]
        const CONNECTING = 1 << 1;
        /// [`ChannelState::Connected`]
        const CONNECTED = 1 << 2;
        /// [`ChannelState::Disconnected`]
        const DISCONNECTED = 1 << 3;
    }
}

bitflags! {
    /// A set of [`LinkState`] values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct LinkStates: u8 {
        /// [`LinkState::Unset`]
        const UNSET = 1 << 0;
        /// [`LinkState::Connecting`]
        const CONNECTING = 1 << 1;
        /// [`LinkState::Connected`]
        const CONNECTED = 1 << 2;
        /// [`LinkState::Failed`]
        const FAILED = 1 << 3;
        /// [`LinkState::Disconnected`]
        const DISCONNECTED = 1 << 4;
    }
}

impl From<ChannelState> for ChannelStates {
    fn from(state: ChannelState) -> Self {
        match state {
            ChannelState::Unset => Self::UNSET,
            ChannelState::Connecting => Self::CONNECTING,
            ChannelState::Connected => Self::CONNECTED,
            ChannelState::Disconnected => Self::DISCONNECTED,
        }
    }
}

impl From<LinkState> for LinkStates {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Unset => Self::UNSET,
            LinkState::Connecting => Self::CONNECTING,
            LinkState::Connected => Self::CONNECTED,
            LinkState::Failed => Self::FAILED,
            LinkState::Disconnected => Self::DISCONNECTED,
        }
    }
}

impl ChannelStates {
    /// Whether `state` is in the set.
    pub fn accepts(self, state: ChannelState) -> bool {
        self.contains(state.into())
    }
}

impl LinkStates {
    /// Whether `state` is in the set.
    pub fn accepts(self, state: LinkState) -> bool {
        self.contains(state.into())
    }

    /// Any state in which the link is not carrying media and should be
    /// (re)started.
    pub const UNHEALTHY: Self = Self::UNSET.union(Self::FAILED).union(Self::DISCONNECTED);
}

/// Per-field constraints of a rule. `None` leaves a field unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Matchers {
    /// Accepted signaling states.
    pub signal: Option<ChannelStates>,
    /// Accepted room states.
    pub room: Option<ChannelStates>,
    /// Accepted local link states.
    pub local_link: Option<LinkStates>,
    /// Accepted remote link states.
    pub remote_link: Option<LinkStates>,
    /// Required remote presence.
    pub remote_present: Option<bool>,
    /// Required remote playback.
    pub remote_playing: Option<bool>,
}

impl Matchers {
    /// Whether every constrained field of `state` is accepted.
    pub fn matches(&self, state: &StateVector) -> bool {
        self.signal.is_none_or(|set| set.accepts(state.signal()))
            && self.room.is_none_or(|set| set.accepts(state.room()))
            && self.local_link.is_none_or(|set| set.accepts(state.local_link()))
            && self.remote_link.is_none_or(|set| set.accepts(state.remote_link()))
            && self.remote_present.is_none_or(|want| want == state.remote_present())
            && self.remote_playing.is_none_or(|want| want == state.remote_playing())
    }

    /// Name of the first constrained field whose accepted set is empty.
    ///
    /// An empty set can never match, which always indicates a table bug.
    pub fn first_empty(&self) -> Option<&'static str> {
        if self.signal.is_some_and(|set| set.is_empty()) {
            return Some("signal");
        }
        if self.room.is_some_and(|set| set.is_empty()) {
            return Some("room");
        }
        if self.local_link.is_some_and(|set| set.is_empty()) {
            return Some("local_link");
        }
        if self.remote_link.is_some_and(|set| set.is_empty()) {
            return Some("remote_link");
        }
        None
    }
}
