//! The session state vector.
//!
//! [`StateVector`] is the single source of truth the rule table is evaluated
//! against. It is only ever changed by applying a [`StateUpdate`], which
//! merges the fields the update carries and reports which fields actually
//! changed.
//!
//! Two invariants are enforced here rather than by callers:
//!
//! - Presence is an `Option<RemotePeer>`, so a remote identity and stream id
//!   exist exactly when the peer is present.
//! - `remote_playing` is forced back to `false` whenever the remote link is
//!   not connected.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Liveness of the signaling channel or of our room membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelState {
    /// Never attempted since the last full restart.
    #[default]
    Unset,
    /// Attempt in progress.
    Connecting,
    /// Up.
    Connected,
    /// Lost or failed; due for repair.
    Disconnected,
}

/// Lifecycle of a transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    /// Never started since the last full restart.
    #[default]
    Unset,
    /// Negotiating.
    Connecting,
    /// Media flowing.
    Connected,
    /// Negotiation or connectivity failed.
    Failed,
    /// Closed after having been up.
    Disconnected,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unset => "unset",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        })
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unset => "unset",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Disconnected => "disconnected",
        })
    }
}

/// The remote participant as currently seen in the room.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePeer {
    /// Room-assigned member id.
    pub identity: String,
    /// Stream to subscribe to (the member's most recent one).
    pub stream_id: String,
}

impl RemotePeer {
    /// Peer with the given identity publishing `stream_id`.
    pub fn new(identity: impl Into<String>, stream_id: impl Into<String>) -> Self {
        Self { identity: identity.into(), stream_id: stream_id.into() }
    }
}

bitflags! {
    /// Fields changed by applying a [`StateUpdate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Changes: u8 {
        /// Signaling channel state.
        const SIGNAL = 1 << 0;
        /// Room state.
        const ROOM = 1 << 1;
        /// Local link state.
        const LOCAL_LINK = 1 << 2;
        /// Remote link state.
        const REMOTE_LINK = 1 << 3;
        /// Remote presence, identity or stream.
        const REMOTE_PEER = 1 << 4;
        /// Remote playback.
        const REMOTE_PLAYING = 1 << 5;
    }
}

/// Snapshot of every subsystem the session depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StateVector {
    signal: ChannelState,
    room: ChannelState,
    local_link: LinkState,
    remote_link: LinkState,
    remote_peer: Option<RemotePeer>,
    remote_playing: bool,
}

impl StateVector {
    /// Vector with every field at its initial value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signaling channel liveness.
    pub fn signal(&self) -> ChannelState {
        self.signal
    }

    /// Room-join status.
    pub fn room(&self) -> ChannelState {
        self.room
    }

    /// Local (publishing) link lifecycle.
    pub fn local_link(&self) -> LinkState {
        self.local_link
    }

    /// Remote (receiving) link lifecycle.
    pub fn remote_link(&self) -> LinkState {
        self.remote_link
    }

    /// The remote participant, when present with a stream.
    pub fn remote_peer(&self) -> Option<&RemotePeer> {
        self.remote_peer.as_ref()
    }

    /// Whether the remote participant is present.
    pub fn remote_present(&self) -> bool {
        self.remote_peer.is_some()
    }

    /// Whether the remote stream is rendering.
    pub fn remote_playing(&self) -> bool {
        self.remote_playing
    }

    /// Merge `update` into the vector and report what changed.
    ///
    /// Normalises `remote_playing` afterwards, so an update can never leave
    /// the remote stream "playing" over a link that is not connected.
    pub fn apply(&mut self, update: StateUpdate) -> Changes {
        let before = self.clone();

        if let Some(signal) = update.signal {
            self.signal = signal;
        }
        if let Some(room) = update.room {
            self.room = room;
        }
        if let Some(local_link) = update.local_link {
            self.local_link = local_link;
        }
        if let Some(remote_link) = update.remote_link {
            self.remote_link = remote_link;
        }
        if let Some(remote_peer) = update.remote_peer {
            self.remote_peer = remote_peer;
        }
        if let Some(remote_playing) = update.remote_playing {
            self.remote_playing = remote_playing;
        }

        if self.remote_link != LinkState::Connected {
            self.remote_playing = false;
        }

        self.diff(&before)
    }

    fn diff(&self, before: &Self) -> Changes {
        let mut changes = Changes::empty();
        changes.set(Changes::SIGNAL, self.signal != before.signal);
        changes.set(Changes::ROOM, self.room != before.room);
        changes.set(Changes::LOCAL_LINK, self.local_link != before.local_link);
        changes.set(Changes::REMOTE_LINK, self.remote_link != before.remote_link);
        changes.set(Changes::REMOTE_PEER, self.remote_peer != before.remote_peer);
        changes.set(Changes::REMOTE_PLAYING, self.remote_playing != before.remote_playing);
        changes
    }
}

impl fmt::Display for StateVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signal={} room={} local={} remote={}",
            self.signal, self.room, self.local_link, self.remote_link
        )?;
        match &self.remote_peer {
            Some(peer) => write!(f, " peer={}/{}", peer.identity, peer.stream_id)?,
            None => f.write_str(" peer=-")?,
        }
        write!(f, " playing={}", self.remote_playing)
    }
}

/// A partial change to a [`StateVector`].
///
/// Fields left unset are not touched. Built with chained setters:
///
/// ```
/// use tandem_core::{ChannelState, StateUpdate, StateVector};
///
/// let mut state = StateVector::new();
/// let changes = state.apply(StateUpdate::new().signal(ChannelState::Connecting));
/// assert!(!changes.is_empty());
/// assert_eq!(state.signal(), ChannelState::Connecting);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateUpdate {
    signal: Option<ChannelState>,
    room: Option<ChannelState>,
    local_link: Option<LinkState>,
    remote_link: Option<LinkState>,
    remote_peer: Option<Option<RemotePeer>>,
    remote_playing: Option<bool>,
}

impl StateUpdate {
    /// Update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-session restart: every field back to its initial value.
    ///
    /// This is the only sanctioned way for enum fields to return to `Unset`.
    pub fn restart() -> Self {
        Self {
            signal: Some(ChannelState::Unset),
            room: Some(ChannelState::Unset),
            local_link: Some(LinkState::Unset),
            remote_link: Some(LinkState::Unset),
            remote_peer: Some(None),
            remote_playing: Some(false),
        }
    }

    /// Set the signaling channel state.
    #[must_use]
    pub fn signal(mut self, state: ChannelState) -> Self {
        self.signal = Some(state);
        self
    }

    /// Set the room state.
    #[must_use]
    pub fn room(mut self, state: ChannelState) -> Self {
        self.room = Some(state);
        self
    }

    /// Set the local link state.
    #[must_use]
    pub fn local_link(mut self, state: LinkState) -> Self {
        self.local_link = Some(state);
        self
    }

    /// Set the remote link state.
    #[must_use]
    pub fn remote_link(mut self, state: LinkState) -> Self {
        self.remote_link = Some(state);
        self
    }

    /// Set (or clear, with `None`) the remote peer.
    #[must_use]
    pub fn remote_peer(mut self, peer: Option<RemotePeer>) -> Self {
        self.remote_peer = Some(peer);
        self
    }

    /// Set remote playback.
    #[must_use]
    pub fn remote_playing(mut self, playing: bool) -> Self {
        self.remote_playing = Some(playing);
        self
    }

    /// Whether the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn new_vector_is_unset() {
        let state = StateVector::new();
        assert_eq!(state.signal(), ChannelState::Unset);
        assert_eq!(state.room(), ChannelState::Unset);
        assert_eq!(state.local_link(), LinkState::Unset);
        assert_eq!(state.remote_link(), LinkState::Unset);
        assert!(!state.remote_present());
        assert!(!state.remote_playing());
    }

    #[test]
    fn apply_reports_only_real_changes() {
        let mut state = StateVector::new();

        let changes = state.apply(StateUpdate::new().signal(ChannelState::Connected));
        assert_eq!(changes, Changes::SIGNAL);

        let changes = state.apply(StateUpdate::new().signal(ChannelState::Connected));
        assert!(changes.is_empty());
    }

    #[test]
    fn empty_update_changes_nothing() {
        let mut state = StateVector::new();
        assert!(StateUpdate::new().is_empty());
        assert!(state.apply(StateUpdate::new()).is_empty());
    }

    #[test]
    fn playing_requires_connected_remote_link() {
        let mut state = StateVector::new();

        let changes = state.apply(StateUpdate::new().remote_playing(true));
        assert!(changes.is_empty());
        assert!(!state.remote_playing());

        state.apply(StateUpdate::new().remote_link(LinkState::Connected));
        let changes = state.apply(StateUpdate::new().remote_playing(true));
        assert_eq!(changes, Changes::REMOTE_PLAYING);
        assert!(state.remote_playing());
    }

    #[test]
    fn remote_link_loss_stops_playback_in_same_update() {
        let mut state = StateVector::new();
        state.apply(StateUpdate::new().remote_link(LinkState::Connected).remote_playing(true));

        let changes = state.apply(StateUpdate::new().remote_link(LinkState::Failed));
        assert_eq!(changes, Changes::REMOTE_LINK | Changes::REMOTE_PLAYING);
        assert!(!state.remote_playing());
    }

    #[test]
    fn restart_returns_everything_to_initial() {
        let mut state = StateVector::new();
        state.apply(
            StateUpdate::new()
                .signal(ChannelState::Connected)
                .room(ChannelState::Connected)
                .local_link(LinkState::Connected)
                .remote_link(LinkState::Connected)
                .remote_peer(Some(RemotePeer::new("bob", "s7")))
                .remote_playing(true),
        );

        state.apply(StateUpdate::restart());
        assert_eq!(state, StateVector::new());
    }

    fn update_strategy() -> impl Strategy<Value = StateUpdate> {
        let channel = prop_oneof![
            Just(ChannelState::Unset),
            Just(ChannelState::Connecting),
            Just(ChannelState::Connected),
            Just(ChannelState::Disconnected),
        ];
        let link = prop_oneof![
            Just(LinkState::Unset),
            Just(LinkState::Connecting),
            Just(LinkState::Connected),
            Just(LinkState::Failed),
            Just(LinkState::Disconnected),
        ];
        let peer = prop::option::of(prop::option::of(
            ("[a-c]{1,3}", "s[0-9]").prop_map(|(identity, stream)| RemotePeer::new(identity, stream)),
        ));
        (
            prop::option::of(channel),
            prop::option::of(link.clone()),
            prop::option::of(link),
            peer,
            prop::option::of(any::<bool>()),
        )
            .prop_map(|(room, local, remote, peer, playing)| {
                let mut update = StateUpdate::new();
                update.room = room;
                update.local_link = local;
                update.remote_link = remote;
                update.remote_peer = peer;
                update.remote_playing = playing;
                update
            })
    }

    proptest! {
        #[test]
        fn prop_playing_only_over_connected_link(
            updates in prop::collection::vec(update_strategy(), 0..40)
        ) {
            let mut state = StateVector::new();
            for update in updates {
                let before = state.clone();
                let changes = state.apply(update);

                prop_assert!(!state.remote_playing() || state.remote_link() == LinkState::Connected);
                prop_assert_eq!(changes.is_empty(), state == before);
            }
        }
    }

    #[test]
    fn display_is_compact() {
        let mut state = StateVector::new();
        state.apply(StateUpdate::new().remote_peer(Some(RemotePeer::new("bob", "s7"))));
        assert_eq!(
            state.to_string(),
            "signal=unset room=unset local=unset remote=unset peer=bob/s7 playing=false"
        );
    }
}
