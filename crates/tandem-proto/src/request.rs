//! Client-to-server requests.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::IceCandidate;

/// Correlates a request with its eventual response.
///
/// Allocated by the session; the signaling channel echoes it back with the
/// response so the session can find what the request was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A request sent to the room server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Join `room` as `user`. The response lists current members.
    JoinRoom {
        /// Our participant id.
        user: String,
        /// Room to join.
        room: String,
    },

    /// Publish local media. The response carries the SDP answer.
    PublishVideo {
        /// Local SDP offer.
        sdp_offer: String,
        /// Ask the server to loop our media back to us.
        do_loopback: bool,
    },

    /// Subscribe to a member's stream. The response carries the SDP answer.
    ReceiveVideoFrom {
        /// Stream name, see [`crate::sender_name`].
        sender: String,
        /// SDP offer of the receiving link.
        sdp_offer: String,
    },

    /// Trickle a local ICE candidate to the server.
    OnIceCandidate(IceCandidate),

    /// Leave the room.
    LeaveRoom,
}

#[derive(Serialize)]
struct JoinRoomParams<'a> {
    user: &'a str,
    room: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublishVideoParams<'a> {
    sdp_offer: &'a str,
    do_loopback: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReceiveVideoFromParams<'a> {
    sender: &'a str,
    sdp_offer: &'a str,
}

impl Request {
    /// JSON-RPC method name.
    pub fn method(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "joinRoom",
            Self::PublishVideo { .. } => "publishVideo",
            Self::ReceiveVideoFrom { .. } => "receiveVideoFrom",
            Self::OnIceCandidate(_) => "onIceCandidate",
            Self::LeaveRoom => "leaveRoom",
        }
    }

    /// JSON-RPC params object.
    pub fn params(&self) -> Value {
        let params = match self {
            Self::JoinRoom { user, room } => serde_json::to_value(JoinRoomParams { user, room }),
            Self::PublishVideo { sdp_offer, do_loopback } => {
                serde_json::to_value(PublishVideoParams { sdp_offer, do_loopback: *do_loopback })
            },
            Self::ReceiveVideoFrom { sender, sdp_offer } => {
                serde_json::to_value(ReceiveVideoFromParams { sender, sdp_offer })
            },
            Self::OnIceCandidate(candidate) => serde_json::to_value(candidate),
            Self::LeaveRoom => return Value::Object(serde_json::Map::new()),
        };

        // Serializing these plain structs cannot fail; an empty object keeps
        // the request well-formed if it ever does.
        params.unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::CandidateInit;

    #[test]
    fn join_room_params() {
        let request = Request::JoinRoom { user: "alice".into(), room: "room1".into() };
        assert_eq!(request.method(), "joinRoom");
        assert_eq!(request.params(), json!({ "user": "alice", "room": "room1" }));
    }

    #[test]
    fn publish_video_params() {
        let request = Request::PublishVideo { sdp_offer: "v=0".into(), do_loopback: false };
        assert_eq!(request.method(), "publishVideo");
        assert_eq!(request.params(), json!({ "sdpOffer": "v=0", "doLoopback": false }));
    }

    #[test]
    fn receive_video_from_params() {
        let request =
            Request::ReceiveVideoFrom { sender: "bob_s7".into(), sdp_offer: "v=0".into() };
        assert_eq!(request.params(), json!({ "sender": "bob_s7", "sdpOffer": "v=0" }));
    }

    #[test]
    fn ice_candidate_params_are_flat() {
        let request = Request::OnIceCandidate(IceCandidate {
            endpoint_name: "alice".into(),
            init: CandidateInit { candidate: "candidate:1".into(), sdp_mid: None, sdp_m_line_index: None },
        });
        assert_eq!(request.method(), "onIceCandidate");
        assert_eq!(request.params(), json!({ "endpointName": "alice", "candidate": "candidate:1" }));
    }

    #[test]
    fn leave_room_has_empty_params() {
        assert_eq!(Request::LeaveRoom.params(), json!({}));
    }
}
