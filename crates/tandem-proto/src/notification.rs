//! Server-to-client push notifications.

use serde::Deserialize;
use serde_json::Value;

use crate::{IceCandidate, Member, ProtocolError, Result};

/// A push notification from the room server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A participant entered the room. They publish nothing yet.
    ParticipantJoined {
        /// Participant id.
        id: String,
    },

    /// A participant published (or republished) media.
    ParticipantPublished(Member),

    /// A participant left the room.
    ParticipantLeft {
        /// Participant id.
        name: String,
    },

    /// A participant was evicted. Without a name the eviction is our own.
    ParticipantEvicted {
        /// Evicted participant, `None` when it is us.
        name: Option<String>,
    },

    /// ICE candidate from the server side of one of our endpoints.
    IceCandidate(IceCandidate),

    /// The server lost our media pipeline.
    MediaError {
        /// Server supplied description.
        error: String,
    },
}

#[derive(Deserialize)]
struct Joined {
    id: String,
}

#[derive(Deserialize)]
struct Left {
    name: String,
}

#[derive(Deserialize)]
struct Evicted {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct MediaFailure {
    #[serde(default)]
    error: Option<String>,
}

impl Notification {
    /// Notification method name as sent by the server.
    pub fn method(&self) -> &'static str {
        match self {
            Self::ParticipantJoined { .. } => "participantJoined",
            Self::ParticipantPublished(_) => "participantPublished",
            Self::ParticipantLeft { .. } => "participantLeft",
            Self::ParticipantEvicted { .. } => "participantEvicted",
            Self::IceCandidate(_) => "iceCandidate",
            Self::MediaError { .. } => "mediaError",
        }
    }

    /// Parse a notification from its method name and params object.
    pub fn parse(method: &str, params: &Value) -> Result<Self> {
        fn decode<'a, T: Deserialize<'a>>(method: &str, params: &'a Value) -> Result<T> {
            T::deserialize(params).map_err(|e| ProtocolError::malformed(method, e))
        }

        match method {
            "participantJoined" => {
                decode::<Joined>(method, params).map(|j| Self::ParticipantJoined { id: j.id })
            },
            "participantPublished" => decode(method, params).map(Self::ParticipantPublished),
            "participantLeft" => {
                decode::<Left>(method, params).map(|l| Self::ParticipantLeft { name: l.name })
            },
            "participantEvicted" => {
                if params.is_null() {
                    return Ok(Self::ParticipantEvicted { name: None });
                }
                decode::<Evicted>(method, params).map(|e| Self::ParticipantEvicted { name: e.name })
            },
            "iceCandidate" => decode(method, params).map(Self::IceCandidate),
            "mediaError" => {
                let error = if params.is_null() {
                    None
                } else {
                    decode::<MediaFailure>(method, params)?.error
                };
                Ok(Self::MediaError { error: error.unwrap_or_default() })
            },
            other => Err(ProtocolError::UnknownNotification(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::CandidateInit;

    #[test]
    fn parse_participant_joined() {
        let n = Notification::parse("participantJoined", &json!({ "id": "bob" })).unwrap();
        assert_eq!(n, Notification::ParticipantJoined { id: "bob".into() });
    }

    #[test]
    fn parse_participant_published() {
        let params = json!({ "id": "bob", "streams": [{ "id": "s7" }] });
        let n = Notification::parse("participantPublished", &params).unwrap();
        assert_eq!(n, Notification::ParticipantPublished(Member::with_streams("bob", ["s7"])));
    }

    #[test]
    fn parse_participant_left() {
        let n = Notification::parse("participantLeft", &json!({ "name": "bob" })).unwrap();
        assert_eq!(n, Notification::ParticipantLeft { name: "bob".into() });
        assert_eq!(n.method(), "participantLeft");
    }

    #[test]
    fn parse_self_eviction() {
        let n = Notification::parse("participantEvicted", &json!({})).unwrap();
        assert_eq!(n, Notification::ParticipantEvicted { name: None });

        let n = Notification::parse("participantEvicted", &Value::Null).unwrap();
        assert_eq!(n, Notification::ParticipantEvicted { name: None });
    }

    #[test]
    fn parse_ice_candidate() {
        let params = json!({
            "endpointName": "alice",
            "candidate": "candidate:1",
            "sdpMid": "0",
            "sdpMLineIndex": 0,
        });
        let n = Notification::parse("iceCandidate", &params).unwrap();
        assert_eq!(
            n,
            Notification::IceCandidate(IceCandidate {
                endpoint_name: "alice".into(),
                init: CandidateInit {
                    candidate: "candidate:1".into(),
                    sdp_mid: Some("0".into()),
                    sdp_m_line_index: Some(0),
                },
            })
        );
    }

    #[test]
    fn parse_media_error_without_detail() {
        let n = Notification::parse("mediaError", &json!({})).unwrap();
        assert_eq!(n, Notification::MediaError { error: String::new() });
    }

    #[test]
    fn malformed_params_are_rejected() {
        let err = Notification::parse("participantLeft", &json!({ "id": 4 })).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }

    #[test]
    fn unknown_method_is_rejected() {
        let err = Notification::parse("sendMessage", &json!({})).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownNotification(m) if m == "sendMessage"));
    }
}
