//! Per-action in-progress guards.

use std::time::{Duration, Instant};

use tandem_core::ActionName;

/// Progress of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Guard {
    /// Free to be scheduled.
    #[default]
    Idle,
    /// Waiting for its delay to elapse.
    Scheduled {
        /// When it becomes due.
        due: Instant,
    },
    /// Started and waiting for a collaborator to report back.
    Running {
        /// When it started.
        since: Instant,
    },
}

/// One guard per action.
#[derive(Debug, Clone, Default)]
pub(crate) struct Guards([Guard; ActionName::ALL.len()]);

impl Guards {
    pub(crate) fn get(&self, action: ActionName) -> Guard {
        self.0[action.index()]
    }

    pub(crate) fn is_idle(&self, action: ActionName) -> bool {
        self.get(action) == Guard::Idle
    }

    pub(crate) fn is_scheduled(&self, action: ActionName) -> bool {
        matches!(self.get(action), Guard::Scheduled { .. })
    }

    pub(crate) fn is_running(&self, action: ActionName) -> bool {
        matches!(self.get(action), Guard::Running { .. })
    }

    /// Idle -> Scheduled. Returns false (and changes nothing) otherwise.
    pub(crate) fn schedule(&mut self, action: ActionName, due: Instant) -> bool {
        let guard = &mut self.0[action.index()];
        if *guard != Guard::Idle {
            return false;
        }
        *guard = Guard::Scheduled { due };
        true
    }

    /// Scheduled -> Running. Returns false (and changes nothing) otherwise.
    pub(crate) fn start(&mut self, action: ActionName, now: Instant) -> bool {
        let guard = &mut self.0[action.index()];
        if !matches!(guard, Guard::Scheduled { .. }) {
            return false;
        }
        *guard = Guard::Running { since: now };
        true
    }

    /// Running -> Idle. A guard that is merely scheduled stays scheduled.
    pub(crate) fn complete(&mut self, action: ActionName) -> bool {
        let guard = &mut self.0[action.index()];
        if !matches!(guard, Guard::Running { .. }) {
            return false;
        }
        *guard = Guard::Idle;
        true
    }

    /// Back to Idle from any state.
    pub(crate) fn release(&mut self, action: ActionName) {
        self.0[action.index()] = Guard::Idle;
    }

    pub(crate) fn release_all(&mut self) {
        self.0 = Default::default();
    }

    /// Running actions that started at least `timeout` before `now`.
    pub(crate) fn overdue(&self, now: Instant, timeout: Duration) -> Vec<(ActionName, Duration)> {
        ActionName::ALL
            .into_iter()
            .filter_map(|action| match self.get(action) {
                Guard::Running { since } => {
                    let elapsed = now.saturating_duration_since(since);
                    (elapsed >= timeout).then_some((action, elapsed))
                },
                _ => None,
            })
            .collect()
    }
}
