//! Identities shared between the session and its collaborators.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{IceServer, LinkState};

/// Which side of the session a link or surface belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Our own (publishing) side.
    Local,
    /// The other participant's (receiving) side.
    Remote,
}

impl Endpoint {
    /// Both endpoints.
    pub const BOTH: [Self; 2] = [Self::Local, Self::Remote];
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Identity of one transport link.
///
/// Every recreation bumps the generation, so events carrying the id of a
/// link that has since been replaced can be told apart and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkId {
    /// Side the link serves.
    pub endpoint: Endpoint,
    /// Monotonic per-session generation.
    pub generation: u64,
}

impl LinkId {
    /// Link `generation` on `endpoint`.
    pub fn new(endpoint: Endpoint, generation: u64) -> Self {
        Self { endpoint, generation }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.endpoint, self.generation)
    }
}

/// Opaque handle to a media stream owned by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaHandle(pub u64);

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media:{}", self.0)
    }
}

/// Kind of media track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Microphone / speaker.
    Audio,
    /// Camera / picture.
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
        })
    }
}

/// Lifecycle reported by a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkLifecycle {
    /// Negotiating connectivity.
    Connecting,
    /// Media flowing.
    Connected,
    /// Connectivity failed.
    Failed,
    /// Closed after having been up.
    Disconnected,
}

impl LinkLifecycle {
    /// Matching state vector value.
    pub fn to_link_state(self) -> LinkState {
        match self {
            Self::Connecting => LinkState::Connecting,
            Self::Connected => LinkState::Connected,
            Self::Failed => LinkState::Failed,
            Self::Disconnected => LinkState::Disconnected,
        }
    }

    /// Whether the link is gone and must be recreated.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Disconnected)
    }
}

/// Negotiation role of a link. Every link makes the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    /// Produces the offer; the media server answers.
    #[default]
    Initiator,
}

/// Everything a link factory needs to create a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Negotiation role.
    pub role: LinkRole,
    /// Media to send, for publishing links.
    pub media: Option<MediaHandle>,
    /// Servers for connectivity discovery.
    pub ice_servers: Vec<IceServer>,
    /// Whether to receive audio.
    pub want_audio: bool,
    /// Whether to receive video.
    pub want_video: bool,
}

impl LinkConfig {
    /// Send-only link publishing `media`.
    pub fn publish(media: MediaHandle, ice_servers: Vec<IceServer>) -> Self {
        Self {
            role: LinkRole::Initiator,
            media: Some(media),
            ice_servers,
            want_audio: false,
            want_video: false,
        }
    }

    /// Receive-only link.
    pub fn receive(ice_servers: Vec<IceServer>, want_video: bool) -> Self {
        Self { role: LinkRole::Initiator, media: None, ice_servers, want_audio: true, want_video }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_id_display() {
        assert_eq!(LinkId::new(Endpoint::Remote, 3).to_string(), "remote#3");
    }

    #[test]
    fn terminal_lifecycles() {
        assert!(LinkLifecycle::Failed.is_terminal());
        assert!(LinkLifecycle::Disconnected.is_terminal());
        assert!(!LinkLifecycle::Connected.is_terminal());
        assert_eq!(LinkLifecycle::Failed.to_link_state(), LinkState::Failed);
    }

    #[test]
    fn publish_link_sends_only() {
        let config = LinkConfig::publish(MediaHandle(1), Vec::new());
        assert_eq!(config.media, Some(MediaHandle(1)));
        assert!(!config.want_audio && !config.want_video);

        let config = LinkConfig::receive(Vec::new(), false);
        assert!(config.want_audio && !config.want_video);
    }
}
