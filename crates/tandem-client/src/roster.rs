//! Room membership as last reported by the server.

use tandem_core::RemotePeer;
use tandem_proto::Member;

#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    members: Vec<Member>,
}

impl Roster {
    /// Replace the roster with the member list from a join response.
    pub(crate) fn replace(&mut self, members: Vec<Member>) {
        self.members = members;
    }

    pub(crate) fn joined(&mut self, id: String) {
        if !self.members.iter().any(|member| member.id == id) {
            self.members.push(Member::new(id));
        }
    }

    /// Record newly published streams. Known streams keep their position so
    /// the latest one stays last.
    pub(crate) fn published(&mut self, member: Member) {
        match self.members.iter_mut().find(|known| known.id == member.id) {
            Some(known) => {
                for stream in member.streams {
                    if !known.streams.contains(&stream) {
                        known.streams.push(stream);
                    }
                }
            },
            None => self.members.push(member),
        }
    }

    pub(crate) fn left(&mut self, id: &str) {
        self.members.retain(|member| member.id != id);
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }

    /// The remote participant, if it is in the room and publishing.
    pub(crate) fn presence(&self, remote_id: &str) -> Option<RemotePeer> {
        let member = self.members.iter().find(|member| member.id == remote_id)?;
        let stream = member.latest_stream()?;
        Some(RemotePeer::new(member.id.clone(), stream.id.clone()))
    }
}
