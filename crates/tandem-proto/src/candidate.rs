//! ICE candidate payloads.

use serde::{Deserialize, Serialize};

/// A trickled ICE candidate as produced or consumed by a transport link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateInit {
    /// Candidate attribute line (`candidate:...`).
    pub candidate: String,
    /// Media stream identification tag, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    /// Index of the media description the candidate belongs to.
    #[serde(default, rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
}

/// An ICE candidate addressed to a named endpoint on the room server.
///
/// The server multiplexes candidates for every endpoint a participant owns
/// over one channel, so each candidate carries the endpoint name it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    /// Endpoint the candidate belongs to.
    pub endpoint_name: String,
    /// The candidate itself.
    #[serde(flatten)]
    pub init: CandidateInit,
}
