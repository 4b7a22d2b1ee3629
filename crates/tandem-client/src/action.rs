//! Actions returned by the session for a driver to execute.

use tandem_core::{Endpoint, LinkConfig, LinkId, MediaConstraints, MediaHandle, Observation, TrackKind};
use tandem_proto::{CandidateInit, Request, RequestId};

/// Work the session wants done.
///
/// Start calls are fire-and-forget: results come back later as
/// [`crate::SessionEvent`]s. Actions must be executed in the order returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Ask the capability gateway for camera and/or microphone.
    AcquireMedia {
        /// What to capture.
        constraints: MediaConstraints,
    },

    /// Open the signaling channel.
    ConnectSignaling,
    /// Close the signaling channel without reporting it back.
    DisconnectSignaling,
    /// Send a request; the response must echo `id`.
    SendRequest {
        /// Correlation id.
        id: RequestId,
        /// The request.
        request: Request,
    },

    /// Create a transport link and start its offer.
    CreateLink {
        /// Identity of the new link.
        link: LinkId,
        /// Creation parameters.
        config: LinkConfig,
    },
    /// Tear down a link. It must not report anything afterwards.
    DestroyLink {
        /// Link to destroy.
        link: LinkId,
    },
    /// Feed the server's SDP answer to a link.
    ApplyRemoteDescription {
        /// Target link.
        link: LinkId,
        /// SDP answer.
        sdp: String,
    },
    /// Feed a server ICE candidate to a link.
    ApplyRemoteCandidate {
        /// Target link.
        link: LinkId,
        /// The candidate.
        candidate: CandidateInit,
    },

    /// Bind media to a presentation surface.
    Attach {
        /// Surface side.
        endpoint: Endpoint,
        /// Media to render.
        media: MediaHandle,
    },
    /// Unbind a presentation surface.
    Detach {
        /// Surface side.
        endpoint: Endpoint,
    },
    /// Enable or disable one track of the media on `endpoint`.
    SetTrackEnabled {
        /// Which side's media.
        endpoint: Endpoint,
        /// Track kind.
        kind: TrackKind,
        /// New state.
        enabled: bool,
    },

    /// Hand an observation to the observability sink.
    Emit(Observation),
}
