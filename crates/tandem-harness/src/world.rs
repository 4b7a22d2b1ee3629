//! Simulated collaborators.
//!
//! [`SimWorld`] plays every collaborator a session talks to: the media
//! capability gateway, the room server behind the signaling channel, the
//! transport links and both presentation surfaces. It executes the
//! [`SessionAction`]s a session returns and schedules the resulting
//! [`SessionEvent`]s after a seeded random latency.
//!
//! Every scheduled event is tagged with what must still exist when it is
//! delivered (the signaling channel it travelled on, the link or surface
//! that produced it). Events whose source was torn down in the meantime are
//! discarded, which is what real collaborators guarantee after a disconnect
//! or destroy.

use std::{
    collections::{BTreeMap, HashMap},
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Value, json};
use tandem_client::{SessionAction, SessionEvent};
use tandem_core::{Endpoint, LinkId, LinkLifecycle, MediaHandle, TrackKind};
use tandem_proto::{
    CandidateInit, IceCandidate, Member, Notification, Request, RequestId, RpcError, sender_name,
};
use tracing::{debug, trace};

use crate::Fault;

/// What an in-flight event depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Source {
    /// Media gateway; always delivered.
    Gateway,
    /// A signaling channel, by epoch.
    Channel(u64),
    /// A link instance.
    Link(LinkId),
    /// A surface attachment, by attach count.
    Surface(Endpoint, u64),
}

#[derive(Debug)]
struct Delivery {
    source: Source,
    event: SessionEvent,
}

/// Counters describing what the session asked of its collaborators.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldStats {
    /// Media acquisition attempts.
    pub acquisitions: usize,
    /// Signaling channels opened.
    pub signaling_connects: usize,
    /// Requests received by the room server, by method.
    pub requests: BTreeMap<&'static str, usize>,
    /// Links created.
    pub links_created: usize,
    /// Links destroyed by the session.
    pub links_destroyed: usize,
    /// Remote candidates applied to links.
    pub remote_candidates: usize,
    /// Events discarded because their source was gone.
    pub discarded: usize,
    /// Track toggles in the order they were applied.
    pub track_changes: Vec<(Endpoint, TrackKind, bool)>,
}

/// In-memory collaborators with seeded latency and injectable faults.
#[derive(Debug)]
pub struct SimWorld {
    user_id: String,
    remote_user_id: String,
    rng: ChaCha8Rng,
    latency_ms: (u64, u64),
    queue: BTreeMap<(Instant, u64), Delivery>,
    seq: u64,
    /// Latest due time per ordered source.
    fifo: HashMap<Source, Instant>,

    channel: Option<u64>,
    epoch: u64,
    joined: bool,
    remote_streams: Vec<String>,
    next_stream: u64,

    camera: bool,
    microphone: bool,
    next_media: u64,

    links: Vec<LinkId>,
    surfaces: [Option<(u64, MediaHandle)>; 2],
    attach_count: u64,

    reject_next_join: bool,
    drop_next_response: bool,
    render_errors: u32,

    stats: WorldStats,
}

fn host_candidate(foundation: u64, port: u16) -> CandidateInit {
    CandidateInit {
        candidate: format!("candidate:{foundation} 1 udp 2122260223 10.0.0.1 {port} typ host"),
        sdp_mid: Some("0".into()),
        sdp_m_line_index: Some(0),
    }
}

fn slot(endpoint: Endpoint) -> usize {
    match endpoint {
        Endpoint::Local => 0,
        Endpoint::Remote => 1,
    }
}

impl SimWorld {
    /// World for `user_id` expecting `remote_user_id`, with latency drawn
    /// from 5..=40 ms.
    pub fn new(user_id: impl Into<String>, remote_user_id: impl Into<String>, seed: u64) -> Self {
        Self {
            user_id: user_id.into(),
            remote_user_id: remote_user_id.into(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            latency_ms: (5, 40),
            queue: BTreeMap::new(),
            seq: 0,
            fifo: HashMap::new(),
            channel: None,
            epoch: 0,
            joined: false,
            remote_streams: Vec::new(),
            next_stream: 0,
            camera: true,
            microphone: true,
            next_media: 0,
            links: Vec::new(),
            surfaces: [None, None],
            attach_count: 0,
            reject_next_join: false,
            drop_next_response: false,
            render_errors: 0,
            stats: WorldStats::default(),
        }
    }

    /// Deliver events after `min..=max` milliseconds.
    #[must_use]
    pub fn with_latency(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = (min.min(max), max.max(min));
        self
    }

    /// The remote participant is already in the room, publishing `stream`.
    #[must_use]
    pub fn with_remote_stream(mut self, stream: impl Into<String>) -> Self {
        self.remote_streams.push(stream.into());
        self
    }

    /// What the session asked for so far.
    pub fn stats(&self) -> &WorldStats {
        &self.stats
    }

    /// Whether the room server currently counts us as a member.
    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Whether a signaling channel is open.
    pub fn signaling_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Whether the remote participant is in the room.
    pub fn remote_in_room(&self) -> bool {
        !self.remote_streams.is_empty()
    }

    /// The stream the remote participant published last.
    pub fn remote_stream(&self) -> Option<&str> {
        self.remote_streams.last().map(String::as_str)
    }

    /// Live links serving `endpoint`.
    pub fn live_links(&self, endpoint: Endpoint) -> usize {
        self.links.iter().filter(|link| link.endpoint == endpoint).count()
    }

    /// Media rendered on `endpoint`, if any.
    pub fn attached(&self, endpoint: Endpoint) -> Option<MediaHandle> {
        self.surfaces[slot(endpoint)].map(|(_, media)| media)
    }

    /// When the next event is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Clear every standing fault condition. Transient effects already in
    /// flight are not recalled.
    pub fn heal(&mut self) {
        self.camera = true;
        self.microphone = true;
        self.reject_next_join = false;
        self.drop_next_response = false;
        self.render_errors = 0;
    }

    /// Next event due at or before `now` whose source still exists.
    pub fn pop_due(&mut self, now: Instant) -> Option<SessionEvent> {
        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                return None;
            }
            let delivery = entry.remove();
            if self.alive(delivery.source) {
                return Some(delivery.event);
            }
            trace!(source = ?delivery.source, event = delivery.event.kind(), "event discarded");
            self.stats.discarded += 1;
        }
        None
    }

    fn alive(&self, source: Source) -> bool {
        match source {
            Source::Gateway => true,
            Source::Channel(epoch) => self.channel == Some(epoch),
            Source::Link(link) => self.links.contains(&link),
            Source::Surface(endpoint, count) => {
                self.surfaces[slot(endpoint)].is_some_and(|(current, _)| current == count)
            },
        }
    }

    /// Schedule `event` after a random latency. Events from the same source
    /// keep their order.
    fn schedule(&mut self, now: Instant, source: Source, event: SessionEvent) {
        let (min, max) = self.latency_ms;
        let mut due = now + Duration::from_millis(self.rng.gen_range(min..=max));
        if source != Source::Gateway {
            let floor = self.fifo.entry(source).or_insert(due);
            due = due.max(*floor);
            *floor = due;
        }

        self.seq += 1;
        self.queue.insert((due, self.seq), Delivery { source, event });
    }

    /// Play the collaborator side of `action`. `Emit` is not addressed to
    /// collaborators and is ignored.
    pub fn execute(&mut self, action: SessionAction, now: Instant) {
        match action {
            SessionAction::AcquireMedia { constraints } => {
                self.stats.acquisitions += 1;
                let event = if !self.microphone {
                    SessionEvent::MediaFailed { reason: "no capture devices".into() }
                } else if constraints.wants_video() && !self.camera {
                    SessionEvent::MediaFailed { reason: "camera unavailable".into() }
                } else {
                    self.next_media += 1;
                    SessionEvent::MediaAcquired { media: MediaHandle(self.next_media) }
                };
                self.schedule(now, Source::Gateway, event);
            },
            SessionAction::ConnectSignaling => {
                self.stats.signaling_connects += 1;
                self.epoch += 1;
                self.channel = Some(self.epoch);
                self.joined = false;
                self.schedule(now, Source::Channel(self.epoch), SessionEvent::SignalingConnected);
            },
            SessionAction::DisconnectSignaling => {
                self.channel = None;
                self.joined = false;
            },
            SessionAction::SendRequest { id, request } => self.on_request(id, request, now),
            SessionAction::CreateLink { link, .. } => {
                self.stats.links_created += 1;
                self.links.push(link);
                let source = Source::Link(link);
                self.schedule(now, source, SessionEvent::LinkDescription {
                    link,
                    sdp: format!("v=0 offer {link}"),
                });
                let candidate = host_candidate(link.generation, 50_000);
                self.schedule(now, source, SessionEvent::LinkCandidate { link, candidate });
            },
            SessionAction::DestroyLink { link } => {
                if let Some(index) = self.links.iter().position(|live| *live == link) {
                    self.links.swap_remove(index);
                    self.stats.links_destroyed += 1;
                }
            },
            SessionAction::ApplyRemoteDescription { link, .. } => {
                if !self.links.contains(&link) {
                    return;
                }
                let source = Source::Link(link);
                self.schedule(now, source, SessionEvent::LinkLifecycle {
                    link,
                    state: LinkLifecycle::Connected,
                });
                if link.endpoint == Endpoint::Remote {
                    let media = MediaHandle(1000 + link.generation);
                    self.schedule(now, source, SessionEvent::LinkStream { link, media });
                }
            },
            SessionAction::ApplyRemoteCandidate { .. } => self.stats.remote_candidates += 1,
            SessionAction::Attach { endpoint, media } => {
                self.attach_count += 1;
                self.surfaces[slot(endpoint)] = Some((self.attach_count, media));
                let event = if endpoint == Endpoint::Remote && self.render_errors > 0 {
                    self.render_errors -= 1;
                    SessionEvent::PlaybackError { endpoint, reason: "decoder error".into() }
                } else {
                    SessionEvent::PlaybackStarted { endpoint }
                };
                self.schedule(now, Source::Surface(endpoint, self.attach_count), event);
            },
            SessionAction::Detach { endpoint } => self.surfaces[slot(endpoint)] = None,
            SessionAction::SetTrackEnabled { endpoint, kind, enabled } => {
                self.stats.track_changes.push((endpoint, kind, enabled));
            },
            SessionAction::Emit(_) => {},
        }
    }

    fn on_request(&mut self, id: RequestId, request: Request, now: Instant) {
        let Some(epoch) = self.channel else {
            debug!(%id, method = request.method(), "request on closed channel lost");
            return;
        };
        *self.stats.requests.entry(request.method()).or_default() += 1;

        if self.drop_next_response {
            self.drop_next_response = false;
            debug!(%id, method = request.method(), "response withheld");
            return;
        }

        // The server trickles one candidate for every negotiated endpoint.
        let endpoint_name = match &request {
            Request::PublishVideo { .. } => Some(self.user_id.clone()),
            Request::ReceiveVideoFrom { sender, .. } => Some(sender.clone()),
            _ => None,
        };

        let result = self.answer(request);
        let answered = result.is_ok();
        self.schedule(now, Source::Channel(epoch), SessionEvent::Response { id, result });

        if let Some(endpoint_name) = endpoint_name.filter(|_| answered) {
            let init = host_candidate(id.0, 40_000);
            self.notify(now, Notification::IceCandidate(IceCandidate { endpoint_name, init }));
        }
    }

    fn answer(&mut self, request: Request) -> Result<Value, RpcError> {
        match request {
            Request::JoinRoom { .. } => {
                if self.reject_next_join {
                    self.reject_next_join = false;
                    return Err(RpcError::new(104, "room closed"));
                }
                self.joined = true;
                Ok(json!({ "sessionId": format!("sim-{}", self.epoch), "value": self.members() }))
            },
            Request::PublishVideo { .. } => {
                if !self.joined {
                    return Err(RpcError::new(40, "not in room"));
                }
                Ok(json!({ "sdpAnswer": "v=0 answer publish" }))
            },
            Request::ReceiveVideoFrom { sender, .. } => {
                let current = self.remote_stream().map(|s| sender_name(&self.remote_user_id, s));
                if !self.joined || current.as_deref() != Some(sender.as_str()) {
                    return Err(RpcError::new(40, format!("unknown sender {sender}")));
                }
                Ok(json!({ "sdpAnswer": format!("v=0 answer {sender}") }))
            },
            Request::OnIceCandidate(_) => Ok(json!({})),
            Request::LeaveRoom => {
                self.joined = false;
                Ok(json!({}))
            },
        }
    }

    fn members(&self) -> Value {
        if self.remote_streams.is_empty() {
            return json!([]);
        }
        let streams: Vec<Value> = self.remote_streams.iter().map(|id| json!({ "id": id })).collect();
        json!([{ "id": self.remote_user_id, "streams": streams }])
    }

    /// Push `notification` to the session if it is in the room.
    fn notify(&mut self, now: Instant, notification: Notification) {
        match self.channel {
            Some(epoch) if self.joined => {
                let event = SessionEvent::Notification(notification);
                self.schedule(now, Source::Channel(epoch), event);
            },
            _ => {},
        }
    }

    /// Make `fault` happen at `now`.
    pub fn inject(&mut self, fault: Fault, now: Instant) {
        debug!(%fault, "injecting fault");
        match fault {
            Fault::DropSignaling => {
                if self.channel.take().is_some() {
                    self.joined = false;
                    self.schedule(now, Source::Gateway, SessionEvent::SignalingDisconnected {
                        reason: "connection reset".into(),
                    });
                }
            },
            Fault::FailLink(endpoint) => {
                if let Some(index) = self.links.iter().position(|link| link.endpoint == endpoint) {
                    let link = self.links.swap_remove(index);
                    self.schedule(now, Source::Gateway, SessionEvent::LinkLifecycle {
                        link,
                        state: LinkLifecycle::Failed,
                    });
                }
            },
            Fault::RemotePublish => {
                let arriving = self.remote_streams.is_empty();
                self.next_stream += 1;
                let stream = format!("s{}", self.next_stream);
                self.remote_streams.push(stream.clone());

                let id = self.remote_user_id.clone();
                if arriving {
                    self.notify(now, Notification::ParticipantJoined { id: id.clone() });
                }
                let member = Member::with_streams(id, [stream]);
                self.notify(now, Notification::ParticipantPublished(member));
            },
            Fault::RemoteLeave => {
                if !self.remote_streams.is_empty() {
                    self.remote_streams.clear();
                    let name = self.remote_user_id.clone();
                    self.notify(now, Notification::ParticipantLeft { name });
                }
            },
            Fault::Evicted => {
                self.notify(now, Notification::ParticipantEvicted { name: None });
                self.joined = false;
            },
            Fault::NoCamera => self.camera = false,
            Fault::MediaUnavailable => {
                self.camera = false;
                self.microphone = false;
            },
            Fault::JoinRejected => self.reject_next_join = true,
            Fault::DropResponse => self.drop_next_response = true,
            Fault::RenderError => match self.surfaces[slot(Endpoint::Remote)] {
                Some((count, _)) => {
                    let event = SessionEvent::PlaybackError {
                        endpoint: Endpoint::Remote,
                        reason: "decoder error".into(),
                    };
                    self.schedule(now, Source::Surface(Endpoint::Remote, count), event);
                },
                None => self.render_errors += 1,
            },
            Fault::FailPlayback => self.render_errors += 3,
            Fault::MediaError => {
                self.notify(now, Notification::MediaError { error: "media pipeline crashed".into() });
            },
        }
    }
}
