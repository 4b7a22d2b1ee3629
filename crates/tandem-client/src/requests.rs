//! Requests awaiting a response.

use std::collections::HashMap;

use tandem_core::{Endpoint, LinkId};
use tandem_proto::RequestId;

/// What an outstanding request was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    JoinRoom,
    Publish { link: LinkId },
    Receive { link: LinkId },
    Candidate { endpoint: Endpoint },
    LeaveRoom,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Requests {
    pending: HashMap<RequestId, Pending>,
    next_id: u64,
}

impl Requests {
    /// Allocate an id and remember what it is for.
    pub(crate) fn register(&mut self, pending: Pending) -> RequestId {
        self.next_id += 1;
        let id = RequestId(self.next_id);
        self.pending.insert(id, pending);
        id
    }

    pub(crate) fn resolve(&mut self, id: RequestId) -> Option<Pending> {
        self.pending.remove(&id)
    }

    /// Forget outstanding requests of one kind, so late responses are ignored.
    pub(crate) fn abandon(&mut self, pending: Pending) {
        self.pending.retain(|_, p| *p != pending);
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }
}
