//! Link and surface bookkeeping per endpoint.

use tandem_core::{Endpoint, LinkId, MediaHandle};

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    link: Option<LinkId>,
    attached: bool,
}

/// Current link instance and surface state of each endpoint.
#[derive(Debug, Clone, Default)]
pub(crate) struct Links {
    local: Slot,
    remote: Slot,
    remote_stream: Option<MediaHandle>,
    generation: u64,
}

impl Links {
    fn slot(&self, endpoint: Endpoint) -> &Slot {
        match endpoint {
            Endpoint::Local => &self.local,
            Endpoint::Remote => &self.remote,
        }
    }

    fn slot_mut(&mut self, endpoint: Endpoint) -> &mut Slot {
        match endpoint {
            Endpoint::Local => &mut self.local,
            Endpoint::Remote => &mut self.remote,
        }
    }

    pub(crate) fn current(&self, endpoint: Endpoint) -> Option<LinkId> {
        self.slot(endpoint).link
    }

    /// Whether `link` is the live instance for its endpoint.
    pub(crate) fn is_current(&self, link: LinkId) -> bool {
        self.current(link.endpoint) == Some(link)
    }

    /// Allocate the next link for `endpoint`. The previous one must already
    /// have been taken.
    pub(crate) fn next(&mut self, endpoint: Endpoint) -> LinkId {
        self.generation += 1;
        let link = LinkId::new(endpoint, self.generation);
        self.slot_mut(endpoint).link = Some(link);
        link
    }

    pub(crate) fn take(&mut self, endpoint: Endpoint) -> Option<LinkId> {
        if endpoint == Endpoint::Remote {
            self.remote_stream = None;
        }
        self.slot_mut(endpoint).link.take()
    }

    pub(crate) fn remote_stream(&self) -> Option<MediaHandle> {
        self.remote_stream
    }

    pub(crate) fn set_remote_stream(&mut self, media: MediaHandle) {
        self.remote_stream = Some(media);
    }

    pub(crate) fn is_attached(&self, endpoint: Endpoint) -> bool {
        self.slot(endpoint).attached
    }

    pub(crate) fn set_attached(&mut self, endpoint: Endpoint, attached: bool) {
        self.slot_mut(endpoint).attached = attached;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_are_unique_across_endpoints() {
        let mut links = Links::default();
        let local = links.next(Endpoint::Local);
        let remote = links.next(Endpoint::Remote);
        assert_ne!(local.generation, remote.generation);
        assert!(links.is_current(local));
        assert!(links.is_current(remote));
    }

    #[test]
    fn replaced_link_is_stale() {
        let mut links = Links::default();
        let old = links.next(Endpoint::Local);
        links.take(Endpoint::Local);
        let new = links.next(Endpoint::Local);

        assert!(!links.is_current(old));
        assert!(links.is_current(new));
    }

    #[test]
    fn taking_remote_link_drops_stream() {
        let mut links = Links::default();
        links.next(Endpoint::Remote);
        links.set_remote_stream(MediaHandle(4));
        links.take(Endpoint::Remote);
        assert_eq!(links.remote_stream(), None);
    }
}
