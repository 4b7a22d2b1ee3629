//! Runtime loop against a scripted driver.
//!
//! The driver answers every start call the way healthy collaborators would,
//! by queueing the resulting event. Time is paused so watchdog passes happen
//! instantly and deterministically.

use std::{collections::VecDeque, future::Future, io, time::Duration};

use serde_json::{Value, json};
use tandem_app::{Control, Driver, Exit, Runtime, RuntimeError};
use tandem_client::{Session, SessionEvent};
use tandem_core::{
    ActionName, ChannelState, Endpoint, LinkConfig, LinkId, LinkLifecycle, LinkState,
    MediaConstraints, MediaHandle, Observation, SessionConfig, TrackKind,
};
use tandem_proto::{CandidateInit, Request, RequestId};

#[derive(Default)]
struct Scripted {
    queue: VecDeque<SessionEvent>,
    /// Return `None` once the queue is empty instead of waiting forever.
    finish_when_empty: bool,
    /// Fail acquisition when video is requested.
    no_camera: bool,
    /// Never report anything about the signaling channel.
    silent_signaling: bool,
    members: Value,
    connects: usize,
    disconnects: usize,
    requests: Vec<Request>,
    attached: Vec<(Endpoint, MediaHandle)>,
}

impl Scripted {
    fn new(members: Value) -> Self {
        Self { members, ..Self::default() }
    }

    fn push(&mut self, event: SessionEvent) {
        self.queue.push_back(event);
    }
}

impl Driver for Scripted {
    type Error = io::Error;

    fn next_event(&mut self) -> impl Future<Output = Option<SessionEvent>> + Send {
        async move {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.finish_when_empty { None } else { std::future::pending().await }
        }
    }

    fn acquire_media(&mut self, constraints: MediaConstraints) -> Result<(), io::Error> {
        if self.no_camera && constraints.wants_video() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no camera"));
        }
        self.push(SessionEvent::MediaAcquired { media: MediaHandle(1) });
        Ok(())
    }

    fn connect_signaling(&mut self) -> Result<(), io::Error> {
        self.connects += 1;
        if !self.silent_signaling {
            self.push(SessionEvent::SignalingConnected);
        }
        Ok(())
    }

    fn disconnect_signaling(&mut self) {
        self.disconnects += 1;
    }

    fn send_request(&mut self, id: RequestId, request: Request) -> Result<(), io::Error> {
        let result = match &request {
            Request::JoinRoom { .. } => json!({ "value": self.members }),
            Request::PublishVideo { .. } | Request::ReceiveVideoFrom { .. } => {
                json!({ "sdpAnswer": "v=0 answer" })
            },
            Request::OnIceCandidate(_) | Request::LeaveRoom => json!({}),
        };
        self.requests.push(request);
        self.push(SessionEvent::Response { id, result: Ok(result) });
        Ok(())
    }

    fn create_link(&mut self, link: LinkId, _config: LinkConfig) -> Result<(), io::Error> {
        self.push(SessionEvent::LinkDescription { link, sdp: "v=0 offer".into() });
        Ok(())
    }

    fn destroy_link(&mut self, _link: LinkId) {}

    fn apply_remote_description(&mut self, link: LinkId, _sdp: String) -> Result<(), io::Error> {
        self.push(SessionEvent::LinkLifecycle { link, state: LinkLifecycle::Connected });
        if link.endpoint == Endpoint::Remote {
            self.push(SessionEvent::LinkStream { link, media: MediaHandle(100 + link.generation) });
        }
        Ok(())
    }

    fn apply_remote_candidate(
        &mut self,
        _link: LinkId,
        _candidate: CandidateInit,
    ) -> Result<(), io::Error> {
        Ok(())
    }

    fn attach(&mut self, endpoint: Endpoint, media: MediaHandle) -> Result<(), io::Error> {
        self.attached.push((endpoint, media));
        self.push(SessionEvent::PlaybackStarted { endpoint });
        Ok(())
    }

    fn detach(&mut self, _endpoint: Endpoint) {}

    fn set_track_enabled(&mut self, _endpoint: Endpoint, _kind: TrackKind, _enabled: bool) {}
}

fn session() -> Session {
    let now = tokio::time::Instant::now().into_std();
    Session::new(SessionConfig::new("room-1", "alice", "bob"), now).unwrap()
}

fn started(observations: &[Observation]) -> Vec<ActionName> {
    observations
        .iter()
        .filter_map(|observation| match observation {
            Observation::ActionStarted { action } => Some(*action),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn healthy_collaborators_reach_published() {
    let mut driver = Scripted::new(json!([]));
    driver.finish_when_empty = true;
    let (mut runtime, _handle) = Runtime::new(session(), driver, Vec::new());

    assert_eq!(runtime.run().await, Exit::DriverFinished);

    let state = runtime.session().state();
    assert_eq!(state.signal(), ChannelState::Connected);
    assert_eq!(state.room(), ChannelState::Connected);
    assert_eq!(state.local_link(), LinkState::Connected);
    assert_eq!(
        started(runtime.sink()),
        vec![ActionName::InitConnection, ActionName::Connect, ActionName::PublishLocal]
    );
    assert_eq!(runtime.driver().attached, vec![(Endpoint::Local, MediaHandle(1))]);
}

#[tokio::test(start_paused = true)]
async fn close_through_handle_leaves_room() {
    let driver = Scripted::new(json!([{ "id": "bob", "streams": [{ "id": "s7" }] }]));
    let (mut runtime, handle) = Runtime::new(session(), driver, Vec::new());

    let closer = handle.clone();
    let (exit, closed) = tokio::join!(runtime.run(), async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        closer.close().await
    });

    assert_eq!(exit, Exit::Closed);
    assert_eq!(closed, Ok(()));

    let observations = runtime.sink();
    assert!(observations.contains(&Observation::PlaybackStarted { endpoint: Endpoint::Remote }));
    assert_eq!(observations.last(), Some(&Observation::SessionClosed));

    let driver = runtime.driver();
    assert_eq!(driver.requests.last(), Some(&Request::LeaveRoom));
    assert_eq!(driver.disconnects, 1);
    assert!(driver.attached.iter().any(|(endpoint, _)| *endpoint == Endpoint::Remote));

    drop(runtime);
    assert_eq!(handle.send(Control::Nudge).await, Err(RuntimeError::Stopped));
}

#[tokio::test(start_paused = true)]
async fn acquisition_error_degrades_to_audio() {
    let mut driver = Scripted::new(json!([]));
    driver.finish_when_empty = true;
    driver.no_camera = true;
    let (mut runtime, _handle) = Runtime::new(session(), driver, Vec::new());

    assert_eq!(runtime.run().await, Exit::DriverFinished);

    let observations = runtime.sink();
    assert!(observations.iter().any(|o| matches!(o, Observation::MediaDegraded { .. })));
    assert!(observations.contains(&Observation::MediaAcquired { audio_only: true }));
    assert_eq!(runtime.session().state().local_link(), LinkState::Connected);
}

#[tokio::test(start_paused = true)]
async fn watchdog_reclaims_silent_signaling() {
    let mut driver = Scripted::new(json!([]));
    driver.silent_signaling = true;
    let (mut runtime, _handle) = Runtime::new(session(), driver, Vec::new());

    // Watchdog passes at 2 s, 7 s and 12 s; the retry follows one backoff later.
    let result = tokio::time::timeout(Duration::from_secs(14), runtime.run()).await;
    assert!(result.is_err());

    assert!(runtime.sink().iter().any(|o| matches!(
        o,
        Observation::ActionTimedOut { action: ActionName::InitConnection, .. }
    )));
    assert_eq!(runtime.driver().connects, 2);
    assert_eq!(runtime.session().state().signal(), ChannelState::Connecting);
}

