//! Collaborator event handlers.
//!
//! Handlers translate what a collaborator reported into state updates. They
//! never run actions directly; anything that should happen next is decided
//! by the reconciliation pass their update queues.

use serde_json::Value;
use tandem_core::{
    ActionName, ChannelState, Endpoint, LinkId, LinkLifecycle, LinkState, MediaHandle,
    Observation, StateUpdate,
};
use tandem_proto::{
    CandidateInit, IceCandidate, Notification, ProtocolError, Request, RequestId, RpcError,
    parse_join_room, parse_sdp_answer, sender_name,
};
use tracing::{debug, info, warn};

use crate::{
    Session, SessionAction, SessionEvent,
    requests::Pending,
    session::Media,
};

/// Action whose completion a link on `endpoint` reports.
fn link_action(endpoint: Endpoint) -> ActionName {
    match endpoint {
        Endpoint::Local => ActionName::PublishLocal,
        Endpoint::Remote => ActionName::ReceiveRemote,
    }
}

fn link_update(endpoint: Endpoint, state: LinkState) -> StateUpdate {
    match endpoint {
        Endpoint::Local => StateUpdate::new().local_link(state),
        Endpoint::Remote => StateUpdate::new().remote_link(state),
    }
}

impl Session {
    pub(crate) fn dispatch_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::MediaAcquired { media } => self.on_media_acquired(media),
            SessionEvent::MediaFailed { reason } => self.on_media_failed(reason),
            SessionEvent::SignalingConnected => self.on_signaling_connected(),
            SessionEvent::SignalingDisconnected { reason } => {
                self.on_signaling_disconnected(&reason);
            },
            SessionEvent::Response { id, result } => self.on_response(id, result),
            SessionEvent::Notification(notification) => self.on_notification(notification),
            SessionEvent::LinkDescription { link, sdp } => self.on_link_description(link, sdp),
            SessionEvent::LinkCandidate { link, candidate } => {
                self.on_link_candidate(link, candidate);
            },
            SessionEvent::LinkStream { link, media } => self.on_link_stream(link, media),
            SessionEvent::LinkLifecycle { link, state } => self.on_link_lifecycle(link, state),
            SessionEvent::PlaybackStarted { endpoint } => self.on_playback_started(endpoint),
            SessionEvent::PlaybackError { endpoint, reason } => {
                self.on_playback_error(endpoint, reason);
            },
        }
    }

    fn on_media_acquired(&mut self, handle: MediaHandle) {
        let Media::Acquiring { audio_only } = self.media else {
            debug!(%handle, "unrequested media ignored");
            return;
        };

        info!(room = %self.room_info(), audio_only, "local media acquired");
        self.media = Media::Ready { handle, audio_only };
        self.emit(Observation::MediaAcquired { audio_only });
        self.apply_track_flags(Endpoint::Local);

        if self.guards.is_running(ActionName::InitConnection)
            && self.state.signal() == ChannelState::Connecting
        {
            self.open_signaling();
        }
    }

    /// Retry once without video, then give up.
    fn on_media_failed(&mut self, reason: String) {
        match self.media {
            Media::Acquiring { audio_only: false } => {
                warn!(room = %self.room_info(), %reason, "video unavailable, retrying audio only");
                self.emit(Observation::MediaDegraded { reason });
                let constraints = self.config.constraints.audio_only();
                self.media = Media::Acquiring { audio_only: true };
                self.push(SessionAction::AcquireMedia { constraints });
            },
            Media::Acquiring { audio_only: true } => {
                self.media = Media::None;
                self.fail(reason);
            },
            Media::None | Media::Ready { .. } => debug!(%reason, "stale media failure ignored"),
        }
    }

    fn on_signaling_connected(&mut self) {
        if !self.signaling_open {
            debug!("signaling connected after close ignored");
            return;
        }

        self.guards.complete(ActionName::InitConnection);
        self.apply_change(StateUpdate::new().signal(ChannelState::Connected));
    }

    fn on_signaling_disconnected(&mut self, reason: &str) {
        if !self.signaling_open {
            debug!(%reason, "signaling loss without open channel ignored");
            return;
        }

        warn!(room = %self.room_info(), %reason, "signaling channel lost");
        self.signaling_open = false;
        self.guards.complete(ActionName::InitConnection);
        self.apply_change(StateUpdate::new().signal(ChannelState::Disconnected));
    }

    fn on_response(&mut self, id: RequestId, result: Result<Value, RpcError>) {
        let Some(pending) = self.requests.resolve(id) else {
            debug!(%id, "response to unknown request ignored");
            return;
        };

        match pending {
            Pending::JoinRoom => self.on_join_response(result),
            Pending::Publish { link } => self.on_answer(link, "publishVideo", result),
            Pending::Receive { link } => self.on_answer(link, "receiveVideoFrom", result),
            Pending::Candidate { endpoint } => {
                if let Err(error) = result {
                    debug!(%endpoint, %error, "candidate rejected");
                    self.emit(Observation::RequestFailed {
                        method: "onIceCandidate",
                        reason: error.message,
                    });
                }
            },
            Pending::LeaveRoom => {},
        }
    }

    fn on_join_response(&mut self, result: Result<Value, RpcError>) {
        self.guards.complete(ActionName::Connect);

        let members = match result {
            Ok(value) => parse_join_room(&value),
            Err(error) => {
                warn!(room = %self.room_info(), %error, "join rejected");
                self.emit(Observation::RequestFailed { method: "joinRoom", reason: error.message });
                self.apply_change(StateUpdate::new().room(ChannelState::Disconnected));
                return;
            },
        };

        match members {
            Ok(members) => {
                info!(room = %self.room_info(), members = members.len(), "joined room");
                self.roster.replace(members);
                self.apply_presence(StateUpdate::new().room(ChannelState::Connected));
            },
            Err(error) => {
                self.protocol_mismatch(&error);
                self.apply_change(StateUpdate::new().room(ChannelState::Disconnected));
            },
        }
    }

    /// Response to `publishVideo` or `receiveVideoFrom`. A failed negotiation
    /// is a failed link.
    fn on_answer(&mut self, link: LinkId, method: &'static str, result: Result<Value, RpcError>) {
        if !self.links.is_current(link) {
            self.stale(link, method);
            return;
        }

        let answer = match result {
            Ok(value) => parse_sdp_answer(method, &value),
            Err(error) => {
                warn!(%link, %error, method, "negotiation rejected");
                self.emit(Observation::RequestFailed { method, reason: error.message });
                self.fail_link(link);
                return;
            },
        };

        match answer {
            Ok(sdp) => self.push(SessionAction::ApplyRemoteDescription { link, sdp }),
            Err(error) => {
                self.protocol_mismatch(&error);
                self.fail_link(link);
            },
        }
    }

    fn on_notification(&mut self, notification: Notification) {
        match notification {
            Notification::ParticipantJoined { id } => {
                self.roster.joined(id);
                self.apply_presence(StateUpdate::new());
            },
            Notification::ParticipantPublished(member) => {
                self.roster.published(member);
                self.apply_presence(StateUpdate::new());
            },
            Notification::ParticipantLeft { name } => {
                self.roster.left(&name);
                self.apply_presence(StateUpdate::new());
            },
            Notification::ParticipantEvicted { name: Some(name) } => {
                self.roster.left(&name);
                self.apply_presence(StateUpdate::new());
            },
            Notification::ParticipantEvicted { name: None } => self.on_evicted(),
            Notification::IceCandidate(candidate) => self.on_remote_candidate(candidate),
            Notification::MediaError { error } => {
                warn!(room = %self.room_info(), %error, "server media error");
                self.emit(Observation::RequestFailed { method: "mediaError", reason: error });
                self.guards.complete(ActionName::InitConnection);
                self.apply_change(StateUpdate::new().signal(ChannelState::Disconnected));
            },
        }
    }

    /// We were removed from the room. Both links served the old membership.
    fn on_evicted(&mut self) {
        warn!(room = %self.room_info(), "evicted from room");
        self.requests.abandon(Pending::JoinRoom);
        self.guards.complete(ActionName::Connect);
        self.roster.clear();

        self.destroy_link(Endpoint::Local);
        self.cancel(ActionName::PublishLocal);
        let mut update = StateUpdate::new().room(ChannelState::Disconnected);
        if self.state.local_link() != LinkState::Unset {
            update = update.local_link(LinkState::Disconnected);
        }
        self.apply_presence(update);
    }

    /// Server candidate for one of our endpoints, named by participant.
    fn on_remote_candidate(&mut self, candidate: IceCandidate) {
        let name = candidate.endpoint_name.as_str();
        let remote_sender =
            self.state.remote_peer().map(|peer| sender_name(&peer.identity, &peer.stream_id));

        let endpoint = if name == self.config.user_id {
            Endpoint::Local
        } else if name == self.config.remote_user_id || remote_sender.as_deref() == Some(name) {
            Endpoint::Remote
        } else {
            debug!(name, "candidate for unknown endpoint");
            self.emit(Observation::UnknownEndpoint { name: candidate.endpoint_name });
            return;
        };

        match self.links.current(endpoint) {
            Some(link) => {
                self.push(SessionAction::ApplyRemoteCandidate { link, candidate: candidate.init });
            },
            None => debug!(%endpoint, "candidate without link dropped"),
        }
    }

    fn on_link_description(&mut self, link: LinkId, sdp: String) {
        if !self.links.is_current(link) {
            self.stale(link, "description");
            return;
        }

        match link.endpoint {
            Endpoint::Local => {
                let request = Request::PublishVideo { sdp_offer: sdp, do_loopback: false };
                self.send(request, Pending::Publish { link });
            },
            Endpoint::Remote => {
                let Some(peer) = self.state.remote_peer() else {
                    debug!(%link, "offer without remote peer dropped");
                    return;
                };
                let sender = sender_name(&peer.identity, &peer.stream_id);
                let request = Request::ReceiveVideoFrom { sender, sdp_offer: sdp };
                self.send(request, Pending::Receive { link });
            },
        }
    }

    fn on_link_candidate(&mut self, link: LinkId, candidate: CandidateInit) {
        if !self.links.is_current(link) {
            self.stale(link, "candidate");
            return;
        }

        let endpoint_name = match link.endpoint {
            Endpoint::Local => self.config.user_id.clone(),
            Endpoint::Remote => self.config.remote_user_id.clone(),
        };
        let request = Request::OnIceCandidate(IceCandidate { endpoint_name, init: candidate });
        self.send(request, Pending::Candidate { endpoint: link.endpoint });
    }

    fn on_link_stream(&mut self, link: LinkId, media: MediaHandle) {
        if !self.links.is_current(link) {
            self.stale(link, "stream");
            return;
        }
        if link.endpoint == Endpoint::Local {
            debug!(%link, "stream on publishing link ignored");
            return;
        }

        self.links.set_remote_stream(media);
        self.queue_reconcile();
    }

    fn on_link_lifecycle(&mut self, link: LinkId, lifecycle: LinkLifecycle) {
        if !self.links.is_current(link) {
            self.stale(link, "lifecycle");
            return;
        }

        debug!(%link, ?lifecycle, "link lifecycle");
        match lifecycle {
            LinkLifecycle::Connecting => {},
            LinkLifecycle::Connected => {
                self.guards.complete(link_action(link.endpoint));
            },
            LinkLifecycle::Failed | LinkLifecycle::Disconnected => {
                self.destroy_link(link.endpoint);
                self.guards.complete(link_action(link.endpoint));
                if link.endpoint == Endpoint::Remote {
                    self.cancel(ActionName::PresentRemote);
                }
            },
        }
        self.apply_change(link_update(link.endpoint, lifecycle.to_link_state()));
    }

    fn on_playback_started(&mut self, endpoint: Endpoint) {
        self.emit(Observation::PlaybackStarted { endpoint });
        if endpoint == Endpoint::Local {
            return;
        }

        self.guards.complete(ActionName::PresentRemote);
        if self.links.is_attached(Endpoint::Remote) {
            self.apply_change(StateUpdate::new().remote_playing(true));
        }
    }

    fn on_playback_error(&mut self, endpoint: Endpoint, reason: String) {
        warn!(room = %self.room_info(), %endpoint, %reason, "playback failed");
        self.emit(Observation::PlaybackFailed { endpoint, reason });
        if endpoint == Endpoint::Local {
            return;
        }

        self.guards.complete(ActionName::PresentRemote);
        self.apply_change(StateUpdate::new().remote_playing(false));
        // Nothing may have changed if playback never started.
        self.queue_reconcile();
    }

    fn fail_link(&mut self, link: LinkId) {
        self.destroy_link(link.endpoint);
        self.guards.complete(link_action(link.endpoint));
        if link.endpoint == Endpoint::Remote {
            self.cancel(ActionName::PresentRemote);
        }
        self.apply_change(link_update(link.endpoint, LinkState::Failed));
    }

    fn stale(&mut self, link: LinkId, event: &'static str) {
        debug!(%link, event, "event for replaced link ignored");
        self.emit(Observation::StaleLinkEvent { link, event });
    }

    fn protocol_mismatch(&mut self, error: &ProtocolError) {
        warn!(room = %self.room_info(), %error, "protocol mismatch");
        self.emit(Observation::ProtocolMismatch {
            method: error.method().to_string(),
            detail: error.to_string(),
        });
    }
}
