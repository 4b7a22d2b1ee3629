//! Generic session runtime.
//!
//! [`Runtime`] owns a [`Session`], a [`Driver`] and an [`ObservabilitySink`]
//! and runs the loop that connects them:
//!
//! ```text
//!   driver.next_event() ──┐
//!   control channel ──────┼──> session ──> Vec<SessionAction> ──> driver / sink
//!   next_deadline timer ──┘
//! ```
//!
//! Events are processed strictly one at a time. Failures of driver start
//! calls are queued as the corresponding failure events and fed back into
//! the session before anything else is awaited.

use std::collections::VecDeque;

use tandem_client::{Session, SessionAction, SessionEvent};
use tandem_core::{Endpoint, LinkLifecycle, TrackKind};
use tandem_proto::RpcError;
use tokio::{
    sync::mpsc,
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::{Driver, ObservabilitySink, RuntimeError};

const CONTROL_CAPACITY: usize = 16;

/// Commands from the application to a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Close the session and stop the runtime.
    Close,
    /// Restart the session from scratch.
    Restart,
    /// Run a reconciliation pass now.
    Nudge,
    /// Enable or disable a track.
    SetTrackEnabled {
        /// Which side's media.
        endpoint: Endpoint,
        /// Track kind.
        kind: TrackKind,
        /// New state.
        enabled: bool,
    },
}

/// Why [`Runtime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The session was closed through the handle.
    Closed,
    /// The driver reported that no more events will arrive.
    DriverFinished,
}

/// Cloneable handle for controlling a running session.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    tx: mpsc::Sender<Control>,
}

impl RuntimeHandle {
    /// Send a control command.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime is no longer running.
    pub async fn send(&self, control: Control) -> Result<(), RuntimeError> {
        self.tx.send(control).await.map_err(|_| RuntimeError::Stopped)
    }

    /// Close the session; the runtime returns afterwards.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime is no longer running.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        self.send(Control::Close).await
    }

    /// Restart the session from scratch.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime is no longer running.
    pub async fn restart(&self) -> Result<(), RuntimeError> {
        self.send(Control::Restart).await
    }

    /// Enable or disable a track.
    ///
    /// # Errors
    ///
    /// `RuntimeError::Stopped` if the runtime is no longer running.
    pub async fn set_track_enabled(
        &self,
        endpoint: Endpoint,
        kind: TrackKind,
        enabled: bool,
    ) -> Result<(), RuntimeError> {
        self.send(Control::SetTrackEnabled { endpoint, kind, enabled }).await
    }
}

/// Runs one session against a driver.
pub struct Runtime<D, S> {
    session: Session,
    driver: D,
    sink: S,
    control: mpsc::Receiver<Control>,
    control_open: bool,
    pending: VecDeque<SessionEvent>,
}

impl<D: Driver, S: ObservabilitySink> Runtime<D, S> {
    /// Create a runtime and the handle that controls it.
    pub fn new(session: Session, driver: D, sink: S) -> (Self, RuntimeHandle) {
        let (tx, rx) = mpsc::channel(CONTROL_CAPACITY);
        let runtime = Self {
            session,
            driver,
            sink,
            control: rx,
            control_open: true,
            pending: VecDeque::new(),
        };
        (runtime, RuntimeHandle { tx })
    }

    /// The session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Start the session and process events until it is closed or the
    /// driver runs dry.
    pub async fn run(&mut self) -> Exit {
        info!(room = %self.session.room_info(), "runtime started");
        let actions = self.session.start(now());
        self.execute(actions);

        loop {
            while let Some(event) = self.pending.pop_front() {
                let actions = self.session.handle(event, now());
                self.execute(actions);
            }

            let deadline = self.session.next_deadline().map(Instant::from_std);
            let timer = async {
                match deadline {
                    Some(deadline) => time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                event = self.driver.next_event() => {
                    let Some(event) = event else {
                        info!("driver finished");
                        return Exit::DriverFinished;
                    };
                    let actions = self.session.handle(event, now());
                    self.execute(actions);
                }
                control = self.control.recv(), if self.control_open => {
                    match control {
                        Some(control) => {
                            self.apply_control(control);
                            if control == Control::Close {
                                return Exit::Closed;
                            }
                        },
                        None => {
                            debug!("all runtime handles dropped");
                            self.control_open = false;
                        },
                    }
                }
                () = timer => {
                    let actions = self.session.tick(now());
                    self.execute(actions);
                }
            }
        }
    }

    fn apply_control(&mut self, control: Control) {
        let now = now();
        let actions = match control {
            Control::Close => self.session.close(now),
            Control::Restart => self.session.restart(now),
            Control::Nudge => self.session.nudge(now),
            Control::SetTrackEnabled { endpoint, kind, enabled } => {
                self.session.set_track_enabled(endpoint, kind, enabled, now)
            },
        };
        self.execute(actions);
    }

    /// Execute actions in order. Failed start calls become events.
    fn execute(&mut self, actions: Vec<SessionAction>) {
        for action in actions {
            if let Some(event) = self.execute_one(action) {
                self.pending.push_back(event);
            }
        }
    }

    fn execute_one(&mut self, action: SessionAction) -> Option<SessionEvent> {
        match action {
            SessionAction::AcquireMedia { constraints } => {
                self.driver.acquire_media(constraints).err().map(|e| {
                    warn!(error = %e, "media request failed");
                    SessionEvent::MediaFailed { reason: e.to_string() }
                })
            },
            SessionAction::ConnectSignaling => self.driver.connect_signaling().err().map(|e| {
                warn!(error = %e, "signaling connect failed");
                SessionEvent::SignalingDisconnected { reason: e.to_string() }
            }),
            SessionAction::DisconnectSignaling => {
                self.driver.disconnect_signaling();
                None
            },
            SessionAction::SendRequest { id, request } => {
                let method = request.method();
                self.driver.send_request(id, request).err().map(|e| {
                    warn!(%id, method, error = %e, "request not sent");
                    SessionEvent::Response { id, result: Err(RpcError::transport(e.to_string())) }
                })
            },
            SessionAction::CreateLink { link, config } => {
                self.driver.create_link(link, config).err().map(|e| {
                    warn!(%link, error = %e, "link creation failed");
                    SessionEvent::LinkLifecycle { link, state: LinkLifecycle::Failed }
                })
            },
            SessionAction::DestroyLink { link } => {
                self.driver.destroy_link(link);
                None
            },
            SessionAction::ApplyRemoteDescription { link, sdp } => {
                self.driver.apply_remote_description(link, sdp).err().map(|e| {
                    warn!(%link, error = %e, "remote description rejected");
                    SessionEvent::LinkLifecycle { link, state: LinkLifecycle::Failed }
                })
            },
            SessionAction::ApplyRemoteCandidate { link, candidate } => {
                if let Err(e) = self.driver.apply_remote_candidate(link, candidate) {
                    debug!(%link, error = %e, "remote candidate rejected");
                }
                None
            },
            SessionAction::Attach { endpoint, media } => {
                self.driver.attach(endpoint, media).err().map(|e| SessionEvent::PlaybackError {
                    endpoint,
                    reason: e.to_string(),
                })
            },
            SessionAction::Detach { endpoint } => {
                self.driver.detach(endpoint);
                None
            },
            SessionAction::SetTrackEnabled { endpoint, kind, enabled } => {
                self.driver.set_track_enabled(endpoint, kind, enabled);
                None
            },
            SessionAction::Emit(observation) => {
                self.sink.emit(self.session.room_info(), &observation);
                None
            },
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}
