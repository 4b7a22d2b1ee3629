//! Events reported to the session by its collaborators.

use serde_json::Value;
use tandem_core::{Endpoint, LinkId, LinkLifecycle, MediaHandle};
use tandem_proto::{CandidateInit, Notification, RequestId, RpcError};

/// Something a collaborator observed.
///
/// Every collaborator callback, including failures of start calls, arrives
/// as one of these through `Session::handle`.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Media requested with `AcquireMedia` is ready.
    MediaAcquired {
        /// Handle to the captured media.
        media: MediaHandle,
    },
    /// Media could not be acquired.
    MediaFailed {
        /// Capture error.
        reason: String,
    },

    /// The signaling channel opened.
    SignalingConnected,
    /// The signaling channel closed or failed.
    SignalingDisconnected {
        /// Transport error or close reason.
        reason: String,
    },
    /// Response (or error) for a request.
    Response {
        /// Id from `SendRequest`.
        id: RequestId,
        /// Result payload or error.
        result: Result<Value, RpcError>,
    },
    /// Server push.
    Notification(Notification),

    /// A link produced its local SDP offer.
    LinkDescription {
        /// Producing link.
        link: LinkId,
        /// SDP offer.
        sdp: String,
    },
    /// A link gathered a local ICE candidate.
    LinkCandidate {
        /// Producing link.
        link: LinkId,
        /// Candidate to trickle.
        candidate: CandidateInit,
    },
    /// A link started receiving a media stream.
    LinkStream {
        /// Receiving link.
        link: LinkId,
        /// Handle to the received stream.
        media: MediaHandle,
    },
    /// A link changed lifecycle state.
    LinkLifecycle {
        /// Reporting link.
        link: LinkId,
        /// New state.
        state: LinkLifecycle,
    },

    /// A surface started rendering.
    PlaybackStarted {
        /// Surface side.
        endpoint: Endpoint,
    },
    /// A surface failed to render.
    PlaybackError {
        /// Surface side.
        endpoint: Endpoint,
        /// Renderer error.
        reason: String,
    },
}

impl SessionEvent {
    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MediaAcquired { .. } => "media_acquired",
            Self::MediaFailed { .. } => "media_failed",
            Self::SignalingConnected => "signaling_connected",
            Self::SignalingDisconnected { .. } => "signaling_disconnected",
            Self::Response { .. } => "response",
            Self::Notification(_) => "notification",
            Self::LinkDescription { .. } => "link_description",
            Self::LinkCandidate { .. } => "link_candidate",
            Self::LinkStream { .. } => "link_stream",
            Self::LinkLifecycle { .. } => "link_lifecycle",
            Self::PlaybackStarted { .. } => "playback_started",
            Self::PlaybackError { .. } => "playback_error",
        }
    }
}
