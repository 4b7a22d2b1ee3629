//! Room membership records.

use serde::{Deserialize, Serialize};

/// A media stream published by a room member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Server-assigned stream id.
    pub id: String,
}

/// A participant currently in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Participant id.
    pub id: String,
    /// Published streams, oldest first.
    #[serde(default)]
    pub streams: Vec<StreamInfo>,
}

impl Member {
    /// Member with no published streams.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), streams: Vec::new() }
    }

    /// Member publishing the given streams, oldest first.
    pub fn with_streams<I, S>(id: impl Into<String>, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            streams: streams.into_iter().map(|id| StreamInfo { id: id.into() }).collect(),
        }
    }

    /// Most recently added stream, if the member publishes anything.
    pub fn latest_stream(&self) -> Option<&StreamInfo> {
        self.streams.last()
    }
}

/// Name the room server uses for a member's stream in `receiveVideoFrom`.
pub fn sender_name(member_id: &str, stream_id: &str) -> String {
    format!("{member_id}_{stream_id}")
}
