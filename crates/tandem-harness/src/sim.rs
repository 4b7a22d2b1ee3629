//! Virtual-clock simulation of one session.
//!
//! [`Simulation`] wires a [`Session`] to a [`SimWorld`] and advances a
//! virtual clock from one interesting instant to the next: a collaborator
//! event coming due, a session timer, or a planned fault. Nothing sleeps, so
//! minutes of session time run in microseconds and every run with the same
//! seed and plan is identical.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use tandem_app::{Control, ObservabilitySink};
use tandem_client::{Session, SessionAction, SessionError, SessionStatus};
use tandem_core::{ActionName, Endpoint, LinkState, Observation, SessionConfig};
use tracing::{debug, warn};

use crate::{Fault, FaultPlan, ScheduledFault, SimWorld};

/// Upper bound on steps per run, so a livelock shows up as a violation
/// instead of a hang.
const MAX_STEPS: u64 = 1_000_000;

/// One session, its simulated collaborators and a virtual clock.
pub struct Simulation<S> {
    session: Session,
    world: SimWorld,
    sink: S,
    plan: VecDeque<ScheduledFault>,
    start: Instant,
    now: Instant,
    history: Vec<Observation>,
    violations: Vec<String>,
    steps: u64,
}

impl<S: ObservabilitySink> Simulation<S> {
    /// Simulation of a session built from `config` with the default rules.
    ///
    /// # Errors
    ///
    /// `SessionError` if the configuration does not validate.
    pub fn new(config: SessionConfig, world: SimWorld, sink: S) -> Result<Self, SessionError> {
        let start = Instant::now();
        let session = Session::new(config, start)?;
        Ok(Self::with_session(session, world, sink, start))
    }

    /// Simulation of an existing session whose clock starts at `start`.
    pub fn with_session(session: Session, world: SimWorld, sink: S, start: Instant) -> Self {
        Self {
            session,
            world,
            sink,
            plan: VecDeque::new(),
            start,
            now: start,
            history: Vec::new(),
            violations: Vec::new(),
            steps: 0,
        }
    }

    /// Schedule every fault of `plan`, relative to the simulation start.
    #[must_use]
    pub fn with_plan(mut self, plan: &FaultPlan) -> Self {
        let mut merged: Vec<ScheduledFault> = self.plan.drain(..).collect();
        merged.extend_from_slice(plan.faults());
        merged.sort_by_key(|scheduled| scheduled.at);
        self.plan = merged.into();
        self
    }

    /// The session under test.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The simulated collaborators.
    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    /// Mutable access to the collaborators, for healing or extra faults.
    pub fn world_mut(&mut self) -> &mut SimWorld {
        &mut self.world
    }

    /// The observability sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Every observation so far, in order.
    pub fn history(&self) -> &[Observation] {
        &self.history
    }

    /// Invariant violations detected so far.
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Current virtual time.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Virtual time since the simulation started.
    pub fn elapsed(&self) -> Duration {
        self.now - self.start
    }

    /// Start the session. Faults planned for the very start are in place
    /// before the first collaborator is asked for anything.
    pub fn start(&mut self) {
        self.inject_due();
        let actions = self.session.start(self.now);
        self.execute(actions);
        self.check();
    }

    /// Apply an application command now.
    pub fn control(&mut self, control: Control) {
        let now = self.now;
        let actions = match control {
            Control::Close => self.session.close(now),
            Control::Restart => self.session.restart(now),
            Control::Nudge => self.session.nudge(now),
            Control::SetTrackEnabled { endpoint, kind, enabled } => {
                self.session.set_track_enabled(endpoint, kind, enabled, now)
            },
        };
        self.execute(actions);
        self.check();
    }

    /// Make `fault` happen now.
    pub fn inject(&mut self, fault: Fault) {
        self.world.inject(fault, self.now);
    }

    /// Advance virtual time by `duration`, processing everything that
    /// comes due.
    pub fn run_for(&mut self, duration: Duration) {
        let end = self.now + duration;
        self.run_until(end);
    }

    /// Advance virtual time to `end`.
    pub fn run_until(&mut self, end: Instant) {
        loop {
            let next = [
                self.world.next_due(),
                self.session.next_deadline(),
                self.plan.front().map(|scheduled| self.start + scheduled.at),
            ]
            .into_iter()
            .flatten()
            .min();

            let Some(next) = next.filter(|next| *next <= end) else {
                self.now = self.now.max(end);
                return;
            };

            self.steps += 1;
            if self.steps > MAX_STEPS {
                self.violate(format!("no quiescence after {MAX_STEPS} steps"));
                self.now = self.now.max(end);
                return;
            }

            self.now = self.now.max(next);
            self.step();
        }
    }

    /// Process everything due at the current instant: planned faults first,
    /// then collaborator events one at a time, then session timers.
    fn step(&mut self) {
        let now = self.now;
        self.inject_due();

        while let Some(event) = self.world.pop_due(now) {
            debug!(event = event.kind(), elapsed = ?self.elapsed(), "delivering event");
            let actions = self.session.handle(event, now);
            self.execute(actions);
            self.check();
        }

        let actions = self.session.tick(now);
        self.execute(actions);
        self.check();
    }

    fn inject_due(&mut self) {
        while self.plan.front().is_some_and(|scheduled| self.start + scheduled.at <= self.now) {
            if let Some(scheduled) = self.plan.pop_front() {
                self.world.inject(scheduled.fault, self.now);
            }
        }
    }

    fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Emit(observation) => {
                    self.sink.emit(self.session.room_info(), &observation);
                    self.history.push(observation);
                },
                other => self.world.execute(other, self.now),
            }
        }
    }

    /// Cross-check session and world after every step.
    fn check(&mut self) {
        let mut found = Vec::new();
        let state = self.session.state();

        if state.remote_playing() && state.remote_link() != LinkState::Connected {
            found.push(format!("remote playing over {} link", state.remote_link()));
        }
        if let Some(peer) = state.remote_peer() {
            if peer.identity != self.session.config().remote_user_id || peer.stream_id.is_empty() {
                found.push(format!("unexpected remote peer {peer:?}"));
            }
        }
        for endpoint in Endpoint::BOTH {
            let live = self.world.live_links(endpoint);
            if live > 1 {
                found.push(format!("{live} live {endpoint} links"));
            }
        }
        let status = self.session.status();
        let armed = self.session.next_deadline().is_some();
        match status {
            SessionStatus::Active if !armed => found.push("active session without watchdog".into()),
            SessionStatus::Closed | SessionStatus::Failed if armed => {
                found.push(format!("{status:?} session still has timers"));
            },
            _ => {},
        }

        for violation in found {
            self.violate(violation);
        }
    }

    fn violate(&mut self, violation: String) {
        let violation = format!("at {:?}: {violation}", self.elapsed());
        warn!(%violation, "invariant violated");
        self.violations.push(violation);
    }

    /// Actions in the order they started.
    pub fn started(&self) -> Vec<ActionName> {
        self.history
            .iter()
            .filter_map(|observation| match observation {
                Observation::ActionStarted { action } => Some(*action),
                _ => None,
            })
            .collect()
    }

    /// How many times `action` was dispatched.
    pub fn dispatched(&self, action: ActionName) -> usize {
        self.history
            .iter()
            .filter(|observation| {
                matches!(observation, Observation::ActionDispatched { action: a, .. } if *a == action)
            })
            .count()
    }

    /// How many observations named `name` were emitted.
    pub fn count(&self, name: &str) -> usize {
        self.history.iter().filter(|observation| observation.name() == name).count()
    }
}
