//! Session state machine.
//!
//! # Architecture: Action-Based State Machine
//!
//! - Entry points take the current time as a parameter
//! - Entry points return `Vec<SessionAction>` for the driver to execute
//! - Collaborator results come back later as [`SessionEvent`]s
//!
//! # Reconciliation
//!
//! Every state change goes through `apply_change`, which merges the update
//! into the [`StateVector`] and queues a reconciliation pass. Passes and
//! immediate actions are queued on a work queue that each entry point drains
//! before returning, so no handler ever recurses into the rule table.
//!
//! ```text
//!   event ──> handler ──> apply_change ──> [Reconcile] ──> rule table
//!                              ^                               │
//!                              │                         [Run(action)]
//!                              └──────── action ───────────────┘
//! ```
//!
//! Delayed dispatches arm a timer instead. When it fires, the table is
//! evaluated again and the action only runs if a rule still selects it.
//!
//! # Guards
//!
//! Each action has one [`Guard`]. Only an idle action can be scheduled, so a
//! pass that selects an action already scheduled or running does nothing.
//! The watchdog reclaims actions left running longer than the action timeout.

use std::{collections::VecDeque, time::Instant};

use tandem_core::{
    ActionName, ChannelState, Endpoint, LinkState, MediaHandle, Observation, RemotePeer, RoomInfo,
    RuleTable, SessionConfig, StateUpdate, StateVector, TrackFlags, TrackKind,
};
use tandem_proto::Request;
use tracing::{debug, info, warn};

use crate::{
    SessionAction, SessionError, SessionEvent,
    guard::{Guard, Guards},
    links::Links,
    requests::{Pending, Requests},
    roster::Roster,
    timers::{TimerKind, Timers},
};

/// Overall lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Created, `start` not called yet.
    Idle,
    /// Reconciling.
    Active,
    /// Gave up (no media could be acquired). Only `restart` resumes.
    Failed,
    /// Closed by the application. Only `restart` resumes.
    Closed,
}

/// Local media acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Media {
    None,
    Acquiring { audio_only: bool },
    Ready { handle: MediaHandle, audio_only: bool },
}

impl Media {
    pub(crate) fn handle(self) -> Option<MediaHandle> {
        match self {
            Self::Ready { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub(crate) fn audio_only(self) -> bool {
        match self {
            Self::Acquiring { audio_only } | Self::Ready { audio_only, .. } => audio_only,
            Self::None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Work {
    Reconcile,
    Run(ActionName),
}

/// One two-party media session.
///
/// Pure state machine: no I/O, no clock. Owned by a single runtime task.
#[derive(Debug)]
pub struct Session {
    pub(crate) config: SessionConfig,
    table: RuleTable,
    room: RoomInfo,
    pub(crate) state: StateVector,
    pub(crate) status: SessionStatus,
    pub(crate) guards: Guards,
    timers: Timers,
    pub(crate) links: Links,
    pub(crate) roster: Roster,
    pub(crate) requests: Requests,
    pub(crate) media: Media,
    pub(crate) tracks: TrackFlags,
    /// Whether a signaling channel has been opened and not closed since.
    pub(crate) signaling_open: bool,
    work: VecDeque<Work>,
    reconcile_pending: bool,
    outbox: Vec<SessionAction>,
    pub(crate) now: Instant,
}

impl Session {
    /// Session using the default rule table.
    ///
    /// # Errors
    ///
    /// `SessionError::Config` if the configuration does not validate.
    pub fn new(config: SessionConfig, now: Instant) -> Result<Self, SessionError> {
        config.validate()?;
        let table = RuleTable::standard(config.timing.backoff)?;
        Self::with_rules(config, table, now)
    }

    /// Session driven by a custom rule table.
    ///
    /// # Errors
    ///
    /// `SessionError::Config` if the configuration does not validate.
    pub fn with_rules(
        config: SessionConfig,
        table: RuleTable,
        now: Instant,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        Ok(Self {
            room: config.room_info(),
            tracks: config.tracks,
            config,
            table,
            state: StateVector::new(),
            status: SessionStatus::Idle,
            guards: Guards::default(),
            timers: Timers::default(),
            links: Links::default(),
            roster: Roster::default(),
            requests: Requests::default(),
            media: Media::None,
            signaling_open: false,
            work: VecDeque::new(),
            reconcile_pending: false,
            outbox: Vec::new(),
            now,
        })
    }

    /// Current state vector.
    pub fn state(&self) -> &StateVector {
        &self.state
    }

    /// Lifecycle status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Who and where, for observation context.
    pub fn room_info(&self) -> &RoomInfo {
        &self.room
    }

    /// Configuration the session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Guard of `action`.
    pub fn guard(&self, action: ActionName) -> Guard {
        self.guards.get(action)
    }

    /// Earliest pending timer. The driver should call [`Self::tick`] then.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Begin the session: arm the watchdog and run the first pass.
    ///
    /// Does nothing unless the session is idle.
    pub fn start(&mut self, now: Instant) -> Vec<SessionAction> {
        self.now = now;
        if self.status != SessionStatus::Idle {
            debug!(status = ?self.status, "start ignored");
            return Vec::new();
        }

        info!(room = %self.room, "session starting");
        self.status = SessionStatus::Active;
        self.timers.arm(TimerKind::Watchdog, now + self.config.timing.watchdog_initial_delay);
        self.queue_reconcile();
        self.finish()
    }

    /// Process a collaborator event.
    ///
    /// Infallible: malformed or unexpected input becomes state updates and
    /// observations.
    pub fn handle(&mut self, event: SessionEvent, now: Instant) -> Vec<SessionAction> {
        self.now = now;
        if self.status == SessionStatus::Closed {
            debug!(event = event.kind(), "event after close ignored");
            return Vec::new();
        }

        self.dispatch_event(event);
        self.finish()
    }

    /// Fire every timer due at `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<SessionAction> {
        self.now = now;

        while let Some(kind) = self.timers.pop_due(now) {
            match kind {
                TimerKind::Action(action) => self.fire(action),
                TimerKind::Watchdog => self.watchdog(),
            }
            self.drain();
        }

        self.finish()
    }

    /// Run a reconciliation pass now.
    pub fn nudge(&mut self, now: Instant) -> Vec<SessionAction> {
        self.now = now;
        if self.status == SessionStatus::Active {
            self.emit(Observation::WatchdogNudge);
            self.queue_reconcile();
        }
        self.finish()
    }

    /// Enable or disable a track on one side, now and whenever that side's
    /// media is attached again.
    pub fn set_track_enabled(
        &mut self,
        endpoint: Endpoint,
        kind: TrackKind,
        enabled: bool,
        now: Instant,
    ) -> Vec<SessionAction> {
        self.now = now;
        self.tracks.set_disabled(endpoint, kind, !enabled);
        self.push(SessionAction::SetTrackEnabled { endpoint, kind, enabled });
        self.finish()
    }

    /// Leave the room and release every collaborator. Nothing is scheduled
    /// afterwards until [`Self::restart`].
    pub fn close(&mut self, now: Instant) -> Vec<SessionAction> {
        self.now = now;
        if self.status == SessionStatus::Closed {
            return Vec::new();
        }

        info!(room = %self.room, "session closing");
        let was_joined = self.state.room() == ChannelState::Connected;
        self.status = SessionStatus::Closed;
        self.timers.clear();
        self.guards.release_all();
        self.work.clear();
        self.reconcile_pending = false;

        if was_joined && self.signaling_open {
            self.send(Request::LeaveRoom, Pending::LeaveRoom);
        }
        self.release_collaborators();

        self.apply_change(
            StateUpdate::new()
                .signal(ChannelState::Disconnected)
                .room(ChannelState::Disconnected)
                .local_link(LinkState::Disconnected)
                .remote_link(LinkState::Disconnected)
                .remote_peer(None),
        );
        self.emit(Observation::SessionClosed);
        self.finish()
    }

    /// Start over from scratch after failure or close.
    ///
    /// Acquired media is kept. Calling this on an idle session starts it.
    pub fn restart(&mut self, now: Instant) -> Vec<SessionAction> {
        if self.status == SessionStatus::Idle {
            return self.start(now);
        }
        self.now = now;

        info!(room = %self.room, status = ?self.status, "session restarting");
        self.timers.clear();
        self.guards.release_all();
        self.work.clear();
        self.reconcile_pending = false;
        self.release_collaborators();
        if matches!(self.media, Media::Acquiring { .. }) {
            self.media = Media::None;
        }

        self.status = SessionStatus::Active;
        self.emit(Observation::SessionRestarted);
        self.apply_change(StateUpdate::restart());
        self.timers.arm(TimerKind::Watchdog, now + self.config.timing.watchdog_initial_delay);
        self.finish()
    }

    /// Merge `update` into the state vector and queue a pass if anything
    /// changed. The only place the vector is mutated.
    pub(crate) fn apply_change(&mut self, update: StateUpdate) {
        let previous = self.state.clone();
        let changes = self.state.apply(update);
        if changes.is_empty() {
            return;
        }

        debug!(room = %self.room, state = %self.state, ?changes, "state changed");
        self.emit(Observation::StateChanged { previous, current: self.state.clone() });
        self.queue_reconcile();
    }

    pub(crate) fn queue_reconcile(&mut self) {
        if !self.reconcile_pending {
            self.reconcile_pending = true;
            self.work.push_back(Work::Reconcile);
        }
    }

    fn drain(&mut self) {
        while let Some(work) = self.work.pop_front() {
            match work {
                Work::Reconcile => {
                    self.reconcile_pending = false;
                    self.reconcile();
                },
                Work::Run(action) => self.run(action),
            }
        }
    }

    fn finish(&mut self) -> Vec<SessionAction> {
        self.drain();
        std::mem::take(&mut self.outbox)
    }

    fn reconcile(&mut self) {
        if self.status != SessionStatus::Active {
            return;
        }

        for dispatch in self.table.evaluate(&self.state) {
            let due = self.now + dispatch.delay;
            if !self.guards.schedule(dispatch.action, due) {
                continue;
            }

            debug!(
                action = %dispatch.action,
                rule = dispatch.rule,
                delay = ?dispatch.delay,
                "action dispatched"
            );
            self.emit(Observation::ActionDispatched {
                action: dispatch.action,
                rule: dispatch.rule,
                delay: dispatch.delay,
            });

            if dispatch.delay.is_zero() {
                self.work.push_back(Work::Run(dispatch.action));
            } else {
                self.timers.arm(TimerKind::Action(dispatch.action), due);
            }
        }
    }

    /// A delayed action came due. Run it only if a rule still selects it.
    fn fire(&mut self, action: ActionName) {
        if !self.guards.is_scheduled(action) {
            return;
        }

        let selected = self.status == SessionStatus::Active
            && self.table.evaluate(&self.state).iter().any(|d| d.action == action);

        if selected {
            self.work.push_back(Work::Run(action));
        } else {
            debug!(%action, "delayed action superseded");
            self.guards.release(action);
            self.emit(Observation::ActionSuperseded { action });
        }
    }

    fn run(&mut self, action: ActionName) {
        if self.status != SessionStatus::Active {
            self.guards.release(action);
            return;
        }
        if !self.guards.start(action, self.now) {
            return;
        }

        self.emit(Observation::ActionStarted { action });
        match action {
            ActionName::InitConnection => self.init_connection(),
            ActionName::Connect => self.connect(),
            ActionName::PublishLocal => self.publish_local(),
            ActionName::ReceiveRemote => self.receive_remote(),
            ActionName::PresentRemote => self.present_remote(),
        }
    }

    fn watchdog(&mut self) {
        if self.status != SessionStatus::Active {
            return;
        }
        self.timers.arm(TimerKind::Watchdog, self.now + self.config.timing.watchdog_interval);

        for (action, elapsed) in self.guards.overdue(self.now, self.config.timing.action_timeout) {
            // Acquisition may be waiting on a user permission prompt.
            if action == ActionName::InitConnection && matches!(self.media, Media::Acquiring { .. })
            {
                continue;
            }

            warn!(room = %self.room, %action, ?elapsed, "action timed out");
            self.guards.release(action);
            self.emit(Observation::ActionTimedOut { action, elapsed });
            self.abandon(action);
        }

        self.emit(Observation::WatchdogNudge);
        self.queue_reconcile();
    }

    /// Record the failure of an action that never reported back.
    fn abandon(&mut self, action: ActionName) {
        match action {
            ActionName::InitConnection => {
                if self.signaling_open {
                    self.signaling_open = false;
                    self.push(SessionAction::DisconnectSignaling);
                }
                self.apply_change(StateUpdate::new().signal(ChannelState::Disconnected));
            },
            ActionName::Connect => {
                self.requests.abandon(Pending::JoinRoom);
                self.apply_change(StateUpdate::new().room(ChannelState::Disconnected));
            },
            ActionName::PublishLocal => {
                self.destroy_link(Endpoint::Local);
                self.apply_change(StateUpdate::new().local_link(LinkState::Failed));
            },
            ActionName::ReceiveRemote => {
                self.destroy_link(Endpoint::Remote);
                self.apply_change(StateUpdate::new().remote_link(LinkState::Failed));
            },
            ActionName::PresentRemote => {},
        }
    }

    /// Give up after media could not be acquired at all.
    pub(crate) fn fail(&mut self, reason: String) {
        warn!(room = %self.room, %reason, "session failed");
        self.status = SessionStatus::Failed;
        self.timers.clear();
        self.guards.release_all();
        self.work.clear();
        self.reconcile_pending = false;
        self.emit(Observation::MediaUnavailable { reason });
        self.apply_change(StateUpdate::new().signal(ChannelState::Disconnected));
    }

    /// Destroy links, detach surfaces and close signaling. Shared by close,
    /// restart and the start of every connection attempt.
    pub(crate) fn release_collaborators(&mut self) {
        for endpoint in Endpoint::BOTH {
            self.destroy_link(endpoint);
            self.detach(endpoint);
        }
        if self.signaling_open {
            self.signaling_open = false;
            self.push(SessionAction::DisconnectSignaling);
        }
        self.requests.clear();
        self.roster.clear();
    }

    /// Release `action` and drop its pending timer.
    pub(crate) fn cancel(&mut self, action: ActionName) {
        self.guards.release(action);
        self.timers.cancel(TimerKind::Action(action));
    }

    pub(crate) fn destroy_link(&mut self, endpoint: Endpoint) {
        let Some(link) = self.links.take(endpoint) else {
            return;
        };
        self.push(SessionAction::DestroyLink { link });
        self.emit(Observation::LinkDestroyed { link });
        if endpoint == Endpoint::Remote {
            self.detach(Endpoint::Remote);
        }
    }

    pub(crate) fn attach(&mut self, endpoint: Endpoint, media: MediaHandle) {
        self.detach(endpoint);
        self.links.set_attached(endpoint, true);
        self.push(SessionAction::Attach { endpoint, media });
    }

    pub(crate) fn detach(&mut self, endpoint: Endpoint) {
        if self.links.is_attached(endpoint) {
            self.links.set_attached(endpoint, false);
            self.push(SessionAction::Detach { endpoint });
        }
    }

    /// Disable the tracks on `endpoint` the application asked to be off.
    pub(crate) fn apply_track_flags(&mut self, endpoint: Endpoint) {
        for kind in [TrackKind::Audio, TrackKind::Video] {
            if self.tracks.disabled(endpoint, kind) {
                self.push(SessionAction::SetTrackEnabled { endpoint, kind, enabled: false });
            }
        }
    }

    /// Recompute presence from the roster and apply it together with
    /// `update`.
    ///
    /// If the peer is lost or replaced (new identity or stream), the remote
    /// link is torn down and its state forced to disconnected in the same
    /// update.
    pub(crate) fn apply_presence(&mut self, mut update: StateUpdate) {
        let peer = self.roster.presence(&self.config.remote_user_id);

        if self.state.remote_peer() != peer.as_ref() {
            if self.state.remote_present() {
                self.drop_remote();
                if self.state.remote_link() != LinkState::Unset {
                    update = update.remote_link(LinkState::Disconnected);
                }
                update = update.remote_playing(false);
            }
            if let Some(RemotePeer { identity, stream_id }) = &peer {
                debug!(room = %self.room, %identity, stream = %stream_id, "remote peer present");
            }
            update = update.remote_peer(peer);
        }

        self.apply_change(update);
    }

    pub(crate) fn drop_remote(&mut self) {
        self.destroy_link(Endpoint::Remote);
        self.cancel(ActionName::ReceiveRemote);
        self.cancel(ActionName::PresentRemote);
    }

    pub(crate) fn send(&mut self, request: Request, pending: Pending) {
        let id = self.requests.register(pending);
        debug!(%id, method = request.method(), "sending request");
        self.push(SessionAction::SendRequest { id, request });
    }

    pub(crate) fn push(&mut self, action: SessionAction) {
        self.outbox.push(action);
    }

    pub(crate) fn emit(&mut self, observation: Observation) {
        self.outbox.push(SessionAction::Emit(observation));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn session() -> (Session, Instant) {
        let t0 = Instant::now();
        let session = Session::new(SessionConfig::new("room", "alice", "bob"), t0).unwrap();
        (session, t0)
    }

    fn observations(actions: &[SessionAction]) -> Vec<&Observation> {
        actions
            .iter()
            .filter_map(|action| match action {
                SessionAction::Emit(observation) => Some(observation),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Session::new(SessionConfig::new("room", "alice", "alice"), Instant::now());
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn start_bootstraps_once() {
        let (mut session, t0) = session();

        let actions = session.start(t0);
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(actions.iter().any(|a| matches!(a, SessionAction::AcquireMedia { .. })));
        assert_eq!(session.state().signal(), ChannelState::Connecting);
        assert!(matches!(session.guard(ActionName::InitConnection), Guard::Running { .. }));

        assert!(session.start(t0).is_empty());
    }

    #[test]
    fn start_arms_watchdog() {
        let (mut session, t0) = session();
        session.start(t0);
        assert_eq!(session.next_deadline(), Some(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn unchanged_update_does_not_reconcile() {
        let (mut session, t0) = session();
        session.start(t0);

        session.apply_change(StateUpdate::new().signal(ChannelState::Connecting));
        assert!(!session.reconcile_pending);
        assert!(session.work.is_empty());
    }

    #[test]
    fn nudge_reports_and_reconciles() {
        let (mut session, t0) = session();
        session.start(t0);

        let actions = session.nudge(t0);
        assert_eq!(observations(&actions), vec![&Observation::WatchdogNudge]);
    }

    #[test]
    fn close_is_terminal_until_restart() {
        let (mut session, t0) = session();
        session.start(t0);

        let actions = session.close(t0);
        assert_eq!(session.status(), SessionStatus::Closed);
        assert!(observations(&actions).contains(&&Observation::SessionClosed));
        assert_eq!(session.next_deadline(), None);

        let actions = session.handle(SessionEvent::SignalingConnected, t0);
        assert!(actions.is_empty());

        let actions = session.restart(t0);
        assert_eq!(session.status(), SessionStatus::Active);
        assert!(actions.iter().any(|a| matches!(a, SessionAction::AcquireMedia { .. })));
    }

    #[test]
    fn track_toggle_is_remembered() {
        let (mut session, t0) = session();

        let actions = session.set_track_enabled(Endpoint::Remote, TrackKind::Audio, false, t0);
        assert_eq!(
            actions,
            vec![SessionAction::SetTrackEnabled {
                endpoint: Endpoint::Remote,
                kind: TrackKind::Audio,
                enabled: false,
            }]
        );
        assert!(session.tracks.disabled(Endpoint::Remote, TrackKind::Audio));
    }
}
