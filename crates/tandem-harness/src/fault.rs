//! Fault injection for simulated collaborators.
//!
//! A [`FaultPlan`] is a time-ordered list of [`Fault`]s. Plans parse from a
//! compact text form so the CLI and tests can share them:
//!
//! ```text
//! 3:drop-signaling,4.5:fail-link=local,10:remote-leave
//! ```
//!
//! Times are seconds since the session started.

use std::{fmt, str::FromStr, time::Duration};

use tandem_core::Endpoint;
use thiserror::Error;

/// One thing that can go wrong (or change) outside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The signaling channel drops; the server forgets our membership.
    DropSignaling,
    /// The current link for the endpoint fails.
    FailLink(Endpoint),
    /// The remote participant publishes a new stream (joining if absent).
    RemotePublish,
    /// The remote participant leaves the room.
    RemoteLeave,
    /// The server evicts us from the room.
    Evicted,
    /// The camera becomes unavailable; audio still works.
    NoCamera,
    /// No media can be acquired at all.
    MediaUnavailable,
    /// The next join request is rejected.
    JoinRejected,
    /// The next request is never answered.
    DropResponse,
    /// Remote playback fails once.
    RenderError,
    /// The next three remote playback attempts fail before they start.
    FailPlayback,
    /// The server pushes a `mediaError`.
    MediaError,
}

impl Fault {
    /// Every fault, for generators.
    pub const ALL: [Self; 13] = [
        Self::DropSignaling,
        Self::FailLink(Endpoint::Local),
        Self::FailLink(Endpoint::Remote),
        Self::RemotePublish,
        Self::RemoteLeave,
        Self::Evicted,
        Self::NoCamera,
        Self::MediaUnavailable,
        Self::JoinRejected,
        Self::DropResponse,
        Self::RenderError,
        Self::FailPlayback,
        Self::MediaError,
    ];
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DropSignaling => f.write_str("drop-signaling"),
            Self::FailLink(endpoint) => write!(f, "fail-link={endpoint}"),
            Self::RemotePublish => f.write_str("remote-publish"),
            Self::RemoteLeave => f.write_str("remote-leave"),
            Self::Evicted => f.write_str("evicted"),
            Self::NoCamera => f.write_str("no-camera"),
            Self::MediaUnavailable => f.write_str("media-unavailable"),
            Self::JoinRejected => f.write_str("join-rejected"),
            Self::DropResponse => f.write_str("drop-response"),
            Self::RenderError => f.write_str("render-error"),
            Self::FailPlayback => f.write_str("fail-playback"),
            Self::MediaError => f.write_str("media-error"),
        }
    }
}

/// Errors parsing faults and fault plans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaultParseError {
    /// Name not recognised.
    #[error("unknown fault `{0}`")]
    UnknownFault(String),
    /// `fail-link=` with something other than `local` or `remote`.
    #[error("unknown endpoint `{0}`")]
    UnknownEndpoint(String),
    /// Plan entry without `<seconds>:`.
    #[error("plan entry `{0}` is missing its time")]
    MissingTime(String),
    /// Time is not a non-negative number of seconds.
    #[error("invalid time `{0}`")]
    BadTime(String),
}

impl FromStr for Fault {
    type Err = FaultParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(endpoint) = s.strip_prefix("fail-link=") {
            return match endpoint {
                "local" => Ok(Self::FailLink(Endpoint::Local)),
                "remote" => Ok(Self::FailLink(Endpoint::Remote)),
                other => Err(FaultParseError::UnknownEndpoint(other.to_string())),
            };
        }

        match s {
            "drop-signaling" => Ok(Self::DropSignaling),
            "remote-publish" => Ok(Self::RemotePublish),
            "remote-leave" => Ok(Self::RemoteLeave),
            "evicted" => Ok(Self::Evicted),
            "no-camera" => Ok(Self::NoCamera),
            "media-unavailable" => Ok(Self::MediaUnavailable),
            "join-rejected" => Ok(Self::JoinRejected),
            "drop-response" => Ok(Self::DropResponse),
            "render-error" => Ok(Self::RenderError),
            "fail-playback" => Ok(Self::FailPlayback),
            "media-error" => Ok(Self::MediaError),
            other => Err(FaultParseError::UnknownFault(other.to_string())),
        }
    }
}

/// A fault and when it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFault {
    /// Offset from session start.
    pub at: Duration,
    /// What happens.
    pub fault: Fault,
}

/// Faults ordered by time. Entries with equal times keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FaultPlan {
    faults: Vec<ScheduledFault>,
}

impl FaultPlan {
    /// Empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `fault` at `at`.
    #[must_use]
    pub fn at(mut self, at: Duration, fault: Fault) -> Self {
        self.push(at, fault);
        self
    }

    /// Add `fault` at `at`.
    pub fn push(&mut self, at: Duration, fault: Fault) {
        let index = self.faults.partition_point(|scheduled| scheduled.at <= at);
        self.faults.insert(index, ScheduledFault { at, fault });
    }

    /// Faults in firing order.
    pub fn faults(&self) -> &[ScheduledFault] {
        &self.faults
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }

    /// Number of scheduled faults.
    pub fn len(&self) -> usize {
        self.faults.len()
    }
}

impl FromStr for FaultPlan {
    type Err = FaultParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut plan = Self::new();

        for entry in s.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
            let (time, fault) = entry
                .split_once(':')
                .ok_or_else(|| FaultParseError::MissingTime(entry.to_string()))?;
            let seconds: f64 =
                time.trim().parse().map_err(|_| FaultParseError::BadTime(time.to_string()))?;
            let at = Duration::try_from_secs_f64(seconds)
                .map_err(|_| FaultParseError::BadTime(time.to_string()))?;
            plan.push(at, fault.parse()?);
        }

        Ok(plan)
    }
}

impl fmt::Display for FaultPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, scheduled) in self.faults.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}:{}", scheduled.at.as_secs_f64(), scheduled.fault)?;
        }
        Ok(())
    }
}
