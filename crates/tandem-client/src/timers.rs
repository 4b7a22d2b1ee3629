//! Cancellable one-shot timers, fired by `Session::tick`.

use std::time::Instant;

use tandem_core::ActionName;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    /// Run a delayed action.
    Action(ActionName),
    /// Watchdog pass.
    Watchdog,
}

#[derive(Debug, Clone, Copy)]
struct Timer {
    due: Instant,
    seq: u64,
    kind: TimerKind,
}

/// At most one pending timer per kind.
#[derive(Debug, Clone, Default)]
pub(crate) struct Timers {
    pending: Vec<Timer>,
    seq: u64,
}

impl Timers {
    /// Arm `kind` at `due`, replacing any pending timer of the same kind.
    pub(crate) fn arm(&mut self, kind: TimerKind, due: Instant) {
        self.cancel(kind);
        self.seq += 1;
        self.pending.push(Timer { due, seq: self.seq, kind });
    }

    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        self.pending.retain(|timer| timer.kind != kind);
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|timer| timer.due).min()
    }

    /// Remove and return the earliest timer due at or before `now`.
    ///
    /// Timers due at the same instant fire in the order they were armed.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let (index, _) = self
            .pending
            .iter()
            .enumerate()
            .filter(|(_, timer)| timer.due <= now)
            .min_by_key(|(_, timer)| (timer.due, timer.seq))?;

        Some(self.pending.swap_remove(index).kind)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn fires_in_deadline_order() {
        let t0 = Instant::now();
        let mut timers = Timers::default();

        timers.arm(TimerKind::Watchdog, t0 + Duration::from_secs(2));
        timers.arm(TimerKind::Action(ActionName::Connect), t0 + Duration::from_secs(1));
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(1)));

        let now = t0 + Duration::from_secs(5);
        assert_eq!(timers.pop_due(now), Some(TimerKind::Action(ActionName::Connect)));
        assert_eq!(timers.pop_due(now), Some(TimerKind::Watchdog));
        assert_eq!(timers.pop_due(now), None);
    }

    #[test]
    fn not_yet_due() {
        let t0 = Instant::now();
        let mut timers = Timers::default();

        timers.arm(TimerKind::Watchdog, t0 + Duration::from_secs(2));
        assert_eq!(timers.pop_due(t0), None);
    }

    #[test]
    fn rearm_replaces() {
        let t0 = Instant::now();
        let mut timers = Timers::default();

        timers.arm(TimerKind::Watchdog, t0 + Duration::from_secs(2));
        timers.arm(TimerKind::Watchdog, t0 + Duration::from_secs(7));
        assert_eq!(timers.next_deadline(), Some(t0 + Duration::from_secs(7)));

        timers.cancel(TimerKind::Watchdog);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn ties_fire_in_arm_order() {
        let t0 = Instant::now();
        let mut timers = Timers::default();

        timers.arm(TimerKind::Action(ActionName::ReceiveRemote), t0);
        timers.arm(TimerKind::Action(ActionName::PublishLocal), t0);

        assert_eq!(timers.pop_due(t0), Some(TimerKind::Action(ActionName::ReceiveRemote)));
        assert_eq!(timers.pop_due(t0), Some(TimerKind::Action(ActionName::PublishLocal)));
    }
}
