//! Session configuration.
//!
//! [`SessionConfig`] is plain data, deserializable from JSON or TOML by the
//! embedding application. Everything except the three identifiers has a
//! default, so a minimal config is just:
//!
//! ```
//! use tandem_core::SessionConfig;
//!
//! let config = SessionConfig::new("room-1", "alice", "bob");
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Endpoint, RoomInfo, TrackKind};

/// A server used for connectivity discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IceServer {
    /// Server URLs (`stun:` or `turn:`).
    pub urls: Vec<String>,
    /// TURN username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// TURN credential.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    /// Unauthenticated server at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self { urls: vec![url.into()], username: None, credential: None }
    }
}

/// Preferred video capture ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConstraints {
    /// Minimum width in pixels.
    pub min_width: u32,
    /// Maximum width in pixels.
    pub max_width: u32,
    /// Minimum height in pixels.
    pub min_height: u32,
    /// Maximum height in pixels.
    pub max_height: u32,
    /// Minimum frame rate.
    pub min_frame_rate: u32,
    /// Maximum frame rate.
    pub max_frame_rate: u32,
}

impl Default for VideoConstraints {
    fn default() -> Self {
        Self {
            min_width: 480,
            max_width: 640,
            min_height: 270,
            max_height: 480,
            min_frame_rate: 1,
            max_frame_rate: 15,
        }
    }
}

/// What to ask the media source for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConstraints {
    /// Capture audio.
    pub audio: bool,
    /// Capture video within these ranges, or no video at all.
    pub video: Option<VideoConstraints>,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self { audio: true, video: Some(VideoConstraints::default()) }
    }
}

impl MediaConstraints {
    /// The same request without video.
    #[must_use]
    pub fn audio_only(self) -> Self {
        Self { audio: true, video: None }
    }

    /// Whether video is requested.
    pub fn wants_video(&self) -> bool {
        self.video.is_some()
    }
}

/// Tracks to start disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackFlags {
    /// Mute our microphone.
    pub disable_local_audio: bool,
    /// Turn off our camera.
    pub disable_local_video: bool,
    /// Silence the remote participant.
    pub disable_remote_audio: bool,
    /// Hide the remote participant's picture.
    pub disable_remote_video: bool,
}

impl TrackFlags {
    /// Whether the `kind` track on `endpoint` starts disabled.
    pub fn disabled(&self, endpoint: Endpoint, kind: TrackKind) -> bool {
        match (endpoint, kind) {
            (Endpoint::Local, TrackKind::Audio) => self.disable_local_audio,
            (Endpoint::Local, TrackKind::Video) => self.disable_local_video,
            (Endpoint::Remote, TrackKind::Audio) => self.disable_remote_audio,
            (Endpoint::Remote, TrackKind::Video) => self.disable_remote_video,
        }
    }

    /// Record whether the `kind` track on `endpoint` is disabled.
    pub fn set_disabled(&mut self, endpoint: Endpoint, kind: TrackKind, disabled: bool) {
        let flag = match (endpoint, kind) {
            (Endpoint::Local, TrackKind::Audio) => &mut self.disable_local_audio,
            (Endpoint::Local, TrackKind::Video) => &mut self.disable_local_video,
            (Endpoint::Remote, TrackKind::Audio) => &mut self.disable_remote_audio,
            (Endpoint::Remote, TrackKind::Video) => &mut self.disable_remote_video,
        };
        *flag = disabled;
    }
}

/// Scheduling intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Delay before repair actions.
    #[serde(with = "millis")]
    pub backoff: Duration,
    /// How long an action may run before the watchdog reclaims it.
    #[serde(with = "millis")]
    pub action_timeout: Duration,
    /// Delay before the first watchdog pass.
    #[serde(with = "millis")]
    pub watchdog_initial_delay: Duration,
    /// Delay between watchdog passes.
    #[serde(with = "millis")]
    pub watchdog_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            action_timeout: Duration::from_secs(10),
            watchdog_initial_delay: Duration::from_secs(2),
            watchdog_interval: Duration::from_secs(5),
        }
    }
}

/// Configuration for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Room to join.
    pub room_id: String,
    /// Our participant id.
    pub user_id: String,
    /// The other participant's id.
    pub remote_user_id: String,
    /// Servers for connectivity discovery.
    #[serde(default)]
    pub ice_servers: Vec<IceServer>,
    /// Media to request.
    #[serde(default)]
    pub constraints: MediaConstraints,
    /// Tracks to start disabled.
    #[serde(default)]
    pub tracks: TrackFlags,
    /// Scheduling intervals.
    #[serde(default)]
    pub timing: Timing,
}

impl SessionConfig {
    /// Config with default media, tracks and timing.
    pub fn new(
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        remote_user_id: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            user_id: user_id.into(),
            remote_user_id: remote_user_id.into(),
            ice_servers: Vec::new(),
            constraints: MediaConstraints::default(),
            tracks: TrackFlags::default(),
            timing: Timing::default(),
        }
    }

    /// Check identifiers and intervals.
    ///
    /// # Errors
    ///
    /// - `MissingField` if an identifier is empty.
    /// - `SameParticipant` if local and remote ids are equal.
    /// - `ZeroInterval` if a timing interval is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room_id.is_empty() {
            return Err(ConfigError::MissingField("room_id"));
        }
        if self.user_id.is_empty() {
            return Err(ConfigError::MissingField("user_id"));
        }
        if self.remote_user_id.is_empty() {
            return Err(ConfigError::MissingField("remote_user_id"));
        }
        if self.user_id == self.remote_user_id {
            return Err(ConfigError::SameParticipant(self.user_id.clone()));
        }

        let timing = &self.timing;
        if timing.backoff.is_zero() {
            return Err(ConfigError::ZeroInterval("backoff"));
        }
        if timing.action_timeout.is_zero() {
            return Err(ConfigError::ZeroInterval("action_timeout"));
        }
        if timing.watchdog_interval.is_zero() {
            return Err(ConfigError::ZeroInterval("watchdog_interval"));
        }

        Ok(())
    }

    /// Context attached to every observation.
    pub fn room_info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            user_id: self.user_id.clone(),
            remote_user_id: self.remote_user_id.clone(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
