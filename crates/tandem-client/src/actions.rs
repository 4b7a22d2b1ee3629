//! The five actions the rule table can select.
//!
//! Each action is idempotent: it tears down whatever instance it replaces
//! before creating a new one. Actions only report progress through
//! `apply_change`; completion is signalled later by the matching event
//! handler, which moves the guard back to idle.

use tandem_core::{
    ActionName, ChannelState, Endpoint, LinkConfig, LinkState, Observation, StateUpdate,
};
use tandem_proto::Request;
use tracing::{debug, info};

use crate::{
    Session, SessionAction,
    requests::Pending,
    session::Media,
};

impl Session {
    /// Full restart of the connection: acquire media if needed, then open a
    /// fresh signaling channel.
    pub(crate) fn init_connection(&mut self) {
        info!(room = %self.room_info(), "initialising connection");

        self.release_collaborators();
        for action in ActionName::ALL {
            if action != ActionName::InitConnection {
                self.cancel(action);
            }
        }

        self.apply_change(StateUpdate::restart().signal(ChannelState::Connecting));

        match self.media {
            Media::Ready { .. } => self.open_signaling(),
            Media::Acquiring { .. } => debug!("media acquisition already in progress"),
            Media::None => self.acquire_media(),
        }
    }

    pub(crate) fn acquire_media(&mut self) {
        let constraints = self.config.constraints;
        self.media = Media::Acquiring { audio_only: !constraints.wants_video() };
        self.push(SessionAction::AcquireMedia { constraints });
    }

    pub(crate) fn open_signaling(&mut self) {
        self.signaling_open = true;
        self.push(SessionAction::ConnectSignaling);
    }

    /// Join the room.
    pub(crate) fn connect(&mut self) {
        self.apply_change(StateUpdate::new().room(ChannelState::Connecting));

        let request = Request::JoinRoom {
            user: self.config.user_id.clone(),
            room: self.config.room_id.clone(),
        };
        self.send(request, Pending::JoinRoom);
    }

    /// Replace the local link and publish local media on it.
    pub(crate) fn publish_local(&mut self) {
        let Some(media) = self.media.handle() else {
            debug!("no local media to publish");
            self.guards.complete(ActionName::PublishLocal);
            self.apply_change(StateUpdate::new().local_link(LinkState::Failed));
            return;
        };

        self.destroy_link(Endpoint::Local);
        let link = self.links.next(Endpoint::Local);
        let config = LinkConfig::publish(media, self.config.ice_servers.clone());
        self.push(SessionAction::CreateLink { link, config });
        self.emit(Observation::LinkCreated { link });

        self.apply_change(StateUpdate::new().local_link(LinkState::Connecting));
        self.attach(Endpoint::Local, media);
    }

    /// Replace the remote link and subscribe to the remote stream.
    pub(crate) fn receive_remote(&mut self) {
        if !self.state.remote_present() {
            self.guards.complete(ActionName::ReceiveRemote);
            return;
        }

        self.destroy_link(Endpoint::Remote);
        let link = self.links.next(Endpoint::Remote);
        let want_video = !self.media.audio_only();
        let config = LinkConfig::receive(self.config.ice_servers.clone(), want_video);
        self.push(SessionAction::CreateLink { link, config });
        self.emit(Observation::LinkCreated { link });

        self.apply_change(StateUpdate::new().remote_link(LinkState::Connecting));
    }

    /// Render the received remote stream.
    pub(crate) fn present_remote(&mut self) {
        let Some(media) = self.links.remote_stream() else {
            debug!("no remote stream yet");
            self.guards.complete(ActionName::PresentRemote);
            return;
        };

        self.attach(Endpoint::Remote, media);
        self.apply_track_flags(Endpoint::Remote);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tandem_core::{MediaHandle, SessionConfig};

    use super::*;
    use crate::SessionEvent;

    fn joined_session() -> (Session, Instant) {
        let t0 = Instant::now();
        let mut session = Session::new(SessionConfig::new("room", "alice", "bob"), t0).unwrap();
        session.start(t0);
        session.handle(SessionEvent::MediaAcquired { media: MediaHandle(1) }, t0);
        session.handle(SessionEvent::SignalingConnected, t0);
        (session, t0)
    }

    #[test]
    fn connect_marks_room_connecting() {
        let (session, _) = joined_session();
        assert_eq!(session.state().room(), ChannelState::Connecting);
        assert!(session.guards.is_running(ActionName::Connect));
    }

    #[test]
    fn init_connection_reuses_media() {
        let (mut session, t0) = joined_session();

        let actions = session.handle(
            SessionEvent::SignalingDisconnected { reason: "reset".into() },
            t0,
        );
        assert!(actions.iter().all(|a| !matches!(a, SessionAction::ConnectSignaling)));

        let actions = session.tick(t0 + session.config().timing.backoff);
        assert!(actions.contains(&SessionAction::ConnectSignaling));
        assert!(!actions.iter().any(|a| matches!(a, SessionAction::AcquireMedia { .. })));
    }

    #[test]
    fn present_without_stream_releases_guard() {
        let (mut session, _) = joined_session();
        session.guards.schedule(ActionName::PresentRemote, session.now);
        session.guards.start(ActionName::PresentRemote, session.now);

        session.present_remote();
        assert!(session.guards.is_idle(ActionName::PresentRemote));
    }
}
