//! Driver trait for abstracting collaborator I/O.
//!
//! The [`Driver`] trait decouples the session runtime from the platform that
//! actually captures media, talks to the room server, negotiates links and
//! renders. Each platform implements the trait, while the generic
//! [`crate::Runtime`] handles all orchestration.
//!
//! Start calls are fire-and-forget. Their outcome, like every other callback,
//! is reported later through [`Driver::next_event`]. An `Err` from a start
//! call means the call could not even be issued; the runtime turns it into
//! the matching failure event.

use std::future::Future;

use tandem_client::SessionEvent;
use tandem_core::{Endpoint, LinkConfig, LinkId, MediaConstraints, MediaHandle, TrackKind};
use tandem_proto::{CandidateInit, Request, RequestId};

/// Abstracts collaborator I/O for the session runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`crate::Runtime`] handles orchestration logic, so the same orchestration
/// code runs against real collaborators and in simulation.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next collaborator event.
    ///
    /// Returns `None` once no collaborator can report anything any more.
    /// Must be cancel safe: the runtime drops the future when a timer or
    /// control message wins the race.
    fn next_event(&mut self) -> impl Future<Output = Option<SessionEvent>> + Send;

    /// Ask for camera and/or microphone.
    ///
    /// Reports `MediaAcquired` or `MediaFailed`.
    fn acquire_media(&mut self, constraints: MediaConstraints) -> Result<(), Self::Error>;

    /// Open the signaling channel.
    ///
    /// Reports `SignalingConnected`, or `SignalingDisconnected` on failure.
    fn connect_signaling(&mut self) -> Result<(), Self::Error>;

    /// Close the signaling channel. Reports nothing.
    fn disconnect_signaling(&mut self);

    /// Send a request over the signaling channel.
    ///
    /// Reports `Response` with the same `id`.
    fn send_request(&mut self, id: RequestId, request: Request) -> Result<(), Self::Error>;

    /// Create a link and start its offer.
    ///
    /// Reports `LinkDescription`, `LinkCandidate`, `LinkStream` and
    /// `LinkLifecycle` tagged with `link`.
    fn create_link(&mut self, link: LinkId, config: LinkConfig) -> Result<(), Self::Error>;

    /// Tear down a link. It must not report anything afterwards.
    fn destroy_link(&mut self, link: LinkId);

    /// Apply the server's SDP answer.
    fn apply_remote_description(&mut self, link: LinkId, sdp: String) -> Result<(), Self::Error>;

    /// Apply a server ICE candidate.
    fn apply_remote_candidate(
        &mut self,
        link: LinkId,
        candidate: CandidateInit,
    ) -> Result<(), Self::Error>;

    /// Render `media` on the `endpoint` surface.
    ///
    /// Reports `PlaybackStarted` or `PlaybackError`.
    fn attach(&mut self, endpoint: Endpoint, media: MediaHandle) -> Result<(), Self::Error>;

    /// Clear the `endpoint` surface.
    fn detach(&mut self, endpoint: Endpoint);

    /// Enable or disable one track of the media on `endpoint`.
    fn set_track_enabled(&mut self, endpoint: Endpoint, kind: TrackKind, enabled: bool);
}
