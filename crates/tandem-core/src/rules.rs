//! Rule table and the reconciliation pass.
//!
//! A [`RuleTable`] is an ordered list of [`Rule`]s evaluated top to bottom
//! against a [`StateVector`]. Every matching rule produces a [`Dispatch`]
//! naming an action and the delay after which it should run. When an
//! exclusive rule matches, the scan stops there.
//!
//! # Default table
//!
//! ```text
//!  #  signal        room          local         remote        peer  playing  action          delay    excl
//!  1  unset         -             -             -             -     -        InitConnection  0        yes
//!  2  disconnected  -             -             -             -     -        InitConnection  backoff  yes
//!  3  connected     unset         -             -             -     -        Connect         0        yes
//!  4  connected     disconnected  -             -             -     -        Connect         backoff  yes
//!  5  connected     connected     unset         -             -     -        PublishLocal    0        no
//!  6  connected     connected     failed|disc   -             -     -        PublishLocal    backoff  no
//!  7  connected     connected     -             unset|failed  yes   -        ReceiveRemote   0        no
//!                                               |disc
//!  8  connected     connected     -             connected     yes   no       PresentRemote   0        no
//! ```
//!
//! Local and remote repair rules are deliberately non-exclusive so publishing
//! and receiving progress independently. A stricter policy is a different
//! table passed to [`RuleTable::new`].

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{ChannelStates, LinkStates, Matchers, RuleTableError, StateVector};

/// Named, idempotent actions the session can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionName {
    /// Acquire media (if needed) and (re)open the signaling channel.
    InitConnection,
    /// Join the room.
    Connect,
    /// (Re)create the local link and publish local media.
    PublishLocal,
    /// (Re)create the remote link and subscribe to the remote stream.
    ReceiveRemote,
    /// Render the remote stream.
    PresentRemote,
}

impl ActionName {
    /// Every action, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::InitConnection,
        Self::Connect,
        Self::PublishLocal,
        Self::ReceiveRemote,
        Self::PresentRemote,
    ];

    /// Dense index, usable for per-action tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable camelCase name for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitConnection => "initConnection",
            Self::Connect => "connect",
            Self::PublishLocal => "publishLocal",
            Self::ReceiveRemote => "receiveRemote",
            Self::PresentRemote => "presentRemote",
        }
    }
}

impl fmt::Display for ActionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When a matched rule's action should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleDelay {
    /// As soon as the current pass finishes.
    Immediate,
    /// After the table's backoff interval.
    Backoff,
    /// After a fixed delay.
    Fixed(Duration),
}

impl RuleDelay {
    /// Concrete delay given the table's backoff interval.
    pub fn resolve(self, backoff: Duration) -> Duration {
        match self {
            Self::Immediate => Duration::ZERO,
            Self::Backoff => backoff,
            Self::Fixed(delay) => delay,
        }
    }
}

/// One entry of a [`RuleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    matchers: Matchers,
    action: ActionName,
    delay: RuleDelay,
    exclusive: bool,
}

impl Rule {
    /// Unconstrained, immediate, non-exclusive rule running `action`.
    pub fn new(action: ActionName) -> Self {
        Self { matchers: Matchers::default(), action, delay: RuleDelay::Immediate, exclusive: false }
    }

    /// Accept these signaling states.
    #[must_use]
    pub fn signal(mut self, states: ChannelStates) -> Self {
        self.matchers.signal = Some(states);
        self
    }

    /// Accept these room states.
    #[must_use]
    pub fn room(mut self, states: ChannelStates) -> Self {
        self.matchers.room = Some(states);
        self
    }

    /// Accept these local link states.
    #[must_use]
    pub fn local_link(mut self, states: LinkStates) -> Self {
        self.matchers.local_link = Some(states);
        self
    }

    /// Accept these remote link states.
    #[must_use]
    pub fn remote_link(mut self, states: LinkStates) -> Self {
        self.matchers.remote_link = Some(states);
        self
    }

    /// Require remote presence (or absence).
    #[must_use]
    pub fn remote_present(mut self, present: bool) -> Self {
        self.matchers.remote_present = Some(present);
        self
    }

    /// Require remote playback (or its absence).
    #[must_use]
    pub fn remote_playing(mut self, playing: bool) -> Self {
        self.matchers.remote_playing = Some(playing);
        self
    }

    /// Run the action after `delay`.
    #[must_use]
    pub fn delay(mut self, delay: RuleDelay) -> Self {
        self.delay = delay;
        self
    }

    /// Run the action after the table's backoff interval.
    #[must_use]
    pub fn backoff(self) -> Self {
        self.delay(RuleDelay::Backoff)
    }

    /// Stop the scan when this rule matches.
    #[must_use]
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// The rule's field constraints.
    pub fn matchers(&self) -> &Matchers {
        &self.matchers
    }

    /// Action to run.
    pub fn action(&self) -> ActionName {
        self.action
    }

    /// Delay before running.
    pub fn delay_kind(&self) -> RuleDelay {
        self.delay
    }

    /// Whether a match stops the scan.
    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    /// Whether `state` satisfies every constrained field.
    pub fn matches(&self, state: &StateVector) -> bool {
        self.matchers.matches(state)
    }
}

/// A rule that matched during a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dispatch {
    /// Index of the matching rule in the table.
    pub rule: usize,
    /// Action to run.
    pub action: ActionName,
    /// Resolved delay.
    pub delay: Duration,
    /// Whether the rule stopped the scan.
    pub exclusive: bool,
}

/// An ordered, validated list of rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
    backoff: Duration,
}

impl RuleTable {
    /// Validate `rules` and build a table.
    ///
    /// # Errors
    ///
    /// - `Empty` if there are no rules.
    /// - `EmptyMatcher` if a constrained field accepts no value.
    /// - `ZeroBackoff` if a rule uses the backoff delay and `backoff` is zero,
    ///   which would turn repair into a hot loop.
    pub fn new(rules: Vec<Rule>, backoff: Duration) -> Result<Self, RuleTableError> {
        if rules.is_empty() {
            return Err(RuleTableError::Empty);
        }

        for (index, rule) in rules.iter().enumerate() {
            if let Some(field) = rule.matchers.first_empty() {
                return Err(RuleTableError::EmptyMatcher { rule: index, field });
            }
            if rule.delay == RuleDelay::Backoff && backoff.is_zero() {
                return Err(RuleTableError::ZeroBackoff { rule: index });
            }
        }

        Ok(Self { rules, backoff })
    }

    /// The default repair-before-progress table.
    ///
    /// # Errors
    ///
    /// `ZeroBackoff` if `backoff` is zero.
    pub fn standard(backoff: Duration) -> Result<Self, RuleTableError> {
        Self::new(standard_rules(), backoff)
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Backoff interval used by [`RuleDelay::Backoff`].
    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Run one reconciliation pass.
    ///
    /// Pure: the same vector always yields the same dispatches.
    pub fn evaluate(&self, state: &StateVector) -> Vec<Dispatch> {
        let mut dispatches = Vec::new();

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matches(state) {
                continue;
            }

            dispatches.push(Dispatch {
                rule: index,
                action: rule.action,
                delay: rule.delay.resolve(self.backoff),
                exclusive: rule.exclusive,
            });

            if rule.exclusive {
                break;
            }
        }

        dispatches
    }
}

fn standard_rules() -> Vec<Rule> {
    use ActionName::{Connect, InitConnection, PresentRemote, PublishLocal, ReceiveRemote};

    let joined = |rule: Rule| rule.signal(ChannelStates::CONNECTED).room(ChannelStates::CONNECTED);

    vec![
        Rule::new(InitConnection).signal(ChannelStates::UNSET).exclusive(),
        Rule::new(InitConnection).signal(ChannelStates::DISCONNECTED).backoff().exclusive(),
        Rule::new(Connect).signal(ChannelStates::CONNECTED).room(ChannelStates::UNSET).exclusive(),
        Rule::new(Connect)
            .signal(ChannelStates::CONNECTED)
            .room(ChannelStates::DISCONNECTED)
            .backoff()
            .exclusive(),
        joined(Rule::new(PublishLocal)).local_link(LinkStates::UNSET),
        joined(Rule::new(PublishLocal))
            .local_link(LinkStates::FAILED | LinkStates::DISCONNECTED)
            .backoff(),
        joined(Rule::new(ReceiveRemote)).remote_present(true).remote_link(LinkStates::UNHEALTHY),
        joined(Rule::new(PresentRemote))
            .remote_present(true)
            .remote_link(LinkStates::CONNECTED)
            .remote_playing(false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChannelState, LinkState, RemotePeer, StateUpdate};

    const BACKOFF: Duration = Duration::from_secs(1);

    fn table() -> RuleTable {
        RuleTable::standard(BACKOFF).unwrap()
    }

    fn joined() -> StateVector {
        let mut state = StateVector::new();
        state.apply(StateUpdate::new().signal(ChannelState::Connected).room(ChannelState::Connected));
        state
    }

    fn actions(dispatches: &[Dispatch]) -> Vec<ActionName> {
        dispatches.iter().map(|d| d.action).collect()
    }

    #[test]
    fn fresh_session_bootstraps() {
        let dispatches = table().evaluate(&StateVector::new());
        assert_eq!(
            dispatches,
            vec![Dispatch {
                rule: 0,
                action: ActionName::InitConnection,
                delay: Duration::ZERO,
                exclusive: true,
            }]
        );
    }

    #[test]
    fn signaling_loss_backs_off() {
        let mut state = joined();
        state.apply(StateUpdate::new().signal(ChannelState::Disconnected));

        let dispatches = table().evaluate(&state);
        assert_eq!(actions(&dispatches), vec![ActionName::InitConnection]);
        assert_eq!(dispatches[0].delay, BACKOFF);
    }

    #[test]
    fn connecting_signal_waits() {
        let mut state = StateVector::new();
        state.apply(StateUpdate::new().signal(ChannelState::Connecting));
        assert!(table().evaluate(&state).is_empty());
    }

    #[test]
    fn room_join_follows_signaling() {
        let mut state = StateVector::new();
        state.apply(StateUpdate::new().signal(ChannelState::Connected));
        assert_eq!(actions(&table().evaluate(&state)), vec![ActionName::Connect]);

        state.apply(StateUpdate::new().room(ChannelState::Disconnected));
        let dispatches = table().evaluate(&state);
        assert_eq!(actions(&dispatches), vec![ActionName::Connect]);
        assert_eq!(dispatches[0].delay, BACKOFF);
    }

    #[test]
    fn publish_and_receive_are_independent() {
        let mut state = joined();
        state.apply(StateUpdate::new().remote_peer(Some(RemotePeer::new("bob", "s7"))));

        let dispatches = table().evaluate(&state);
        assert_eq!(actions(&dispatches), vec![ActionName::PublishLocal, ActionName::ReceiveRemote]);
        assert!(dispatches.iter().all(|d| !d.exclusive));
    }

    #[test]
    fn local_failure_repairs_with_backoff() {
        let mut state = joined();
        state.apply(StateUpdate::new().local_link(LinkState::Failed));

        let dispatches = table().evaluate(&state);
        assert_eq!(actions(&dispatches), vec![ActionName::PublishLocal]);
        assert_eq!(dispatches[0].delay, BACKOFF);
    }

    #[test]
    fn connected_remote_gets_presented() {
        let mut state = joined();
        state.apply(
            StateUpdate::new()
                .local_link(LinkState::Connected)
                .remote_peer(Some(RemotePeer::new("bob", "s7")))
                .remote_link(LinkState::Connected),
        );
        assert_eq!(actions(&table().evaluate(&state)), vec![ActionName::PresentRemote]);

        state.apply(StateUpdate::new().remote_playing(true));
        assert!(table().evaluate(&state).is_empty());
    }

    #[test]
    fn exclusive_match_suppresses_later_rules() {
        // Link rules would match if the signal rule did not stop the scan.
        let rules = vec![
            Rule::new(ActionName::InitConnection).exclusive(),
            Rule::new(ActionName::PublishLocal),
        ];
        let table = RuleTable::new(rules, BACKOFF).unwrap();
        assert_eq!(actions(&table.evaluate(&joined())), vec![ActionName::InitConnection]);
    }

    #[test]
    fn empty_table_is_rejected() {
        assert_eq!(RuleTable::new(Vec::new(), BACKOFF), Err(RuleTableError::Empty));
    }

    #[test]
    fn empty_matcher_is_rejected() {
        let rules = vec![Rule::new(ActionName::Connect).room(ChannelStates::empty())];
        assert_eq!(
            RuleTable::new(rules, BACKOFF),
            Err(RuleTableError::EmptyMatcher { rule: 0, field: "room" })
        );
    }

    #[test]
    fn zero_backoff_is_rejected() {
        assert_eq!(RuleTable::standard(Duration::ZERO), Err(RuleTableError::ZeroBackoff { rule: 1 }));
    }

    #[test]
    fn action_indices_are_dense() {
        for (i, action) in ActionName::ALL.iter().enumerate() {
            assert_eq!(action.index(), i);
        }
    }
}
