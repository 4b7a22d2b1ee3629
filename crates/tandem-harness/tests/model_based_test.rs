//! Model-based property tests.
//!
//! The default rule table is checked against a hand-written reference model
//! on arbitrary state vectors, and whole sessions are driven through random
//! operation sequences to check that invariants hold throughout and that the
//! session always settles once its collaborators are healthy again.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: StateVector          Vec<Operation>
//!                          │                     │
//!           ┌──────────────┴───┐          ┌──────┴───────┐
//!           ▼                  ▼          ▼              ▼
//!      RuleTable         reference    Simulation     invariants,
//!      evaluate            model      (SimWorld)     settles after heal
//! ```

use std::time::Duration;

use proptest::prelude::*;
use tandem_app::{Control, TracingSink};
use tandem_client::SessionStatus;
use tandem_core::{
    ChannelState, Endpoint, LinkState, RemotePeer, RuleTable, SessionConfig, StateUpdate,
    StateVector, TrackKind,
};
use tandem_harness::{
    Fault, Operation, SimWorld, Simulation, expected_dispatches, scenario::settled,
};

const BACKOFF: Duration = Duration::from_secs(1);

fn channel_state() -> impl Strategy<Value = ChannelState> {
    prop_oneof![
        Just(ChannelState::Unset),
        Just(ChannelState::Connecting),
        Just(ChannelState::Connected),
        Just(ChannelState::Disconnected),
    ]
}

fn link_state() -> impl Strategy<Value = LinkState> {
    prop_oneof![
        Just(LinkState::Unset),
        Just(LinkState::Connecting),
        Just(LinkState::Connected),
        Just(LinkState::Failed),
        Just(LinkState::Disconnected),
    ]
}

fn state_strategy() -> impl Strategy<Value = StateVector> {
    (
        channel_state(),
        channel_state(),
        link_state(),
        link_state(),
        prop::option::of(("[a-c]", "s[0-9]")),
        any::<bool>(),
    )
        .prop_map(|(signal, room, local, remote, peer, playing)| {
            let mut state = StateVector::new();
            state.apply(
                StateUpdate::new()
                    .signal(signal)
                    .room(room)
                    .local_link(local)
                    .remote_link(remote)
                    .remote_peer(peer.map(|(identity, stream)| RemotePeer::new(identity, stream)))
                    .remote_playing(playing),
            );
            state
        })
}

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        // Weight towards letting the session react
        4 => (0..5_000u64).prop_map(|millis| Operation::Advance { millis }),
        3 => prop::sample::select(Fault::ALL.to_vec()).prop_map(Operation::Inject),
        1 => Just(Operation::Nudge),
        1 => (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(remote, video, enabled)| {
            Operation::ToggleTrack {
                endpoint: if remote { Endpoint::Remote } else { Endpoint::Local },
                kind: if video { TrackKind::Video } else { TrackKind::Audio },
                enabled,
            }
        }),
        1 => Just(Operation::Bounce),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The rule table selects exactly what the reference model selects.
    #[test]
    fn prop_table_matches_model(state in state_strategy()) {
        let table = RuleTable::standard(BACKOFF).unwrap();
        let actual: Vec<_> =
            table.evaluate(&state).into_iter().map(|d| (d.action, d.delay)).collect();

        prop_assert_eq!(actual, expected_dispatches(&state, BACKOFF), "state {}", state);
    }

    /// Reconciliation is a pure function of the state vector.
    #[test]
    fn prop_evaluation_is_deterministic(state in state_strategy()) {
        let table = RuleTable::standard(BACKOFF).unwrap();
        prop_assert_eq!(table.evaluate(&state), table.evaluate(&state.clone()));
    }

    /// Remote playback never outlives a connected remote link.
    #[test]
    fn prop_playing_implies_connected(state in state_strategy()) {
        prop_assert!(!state.remote_playing() || state.remote_link() == LinkState::Connected);
    }

    /// Invariants hold under arbitrary faults, and the session settles once
    /// the faults stop.
    #[test]
    fn prop_session_recovers(
        seed in any::<u64>(),
        remote in any::<bool>(),
        ops in prop::collection::vec(operation_strategy(), 0..30)
    ) {
        let mut world = SimWorld::new("alice", "bob", seed);
        if remote {
            world = world.with_remote_stream("s0");
        }
        let config = SessionConfig::new("room-1", "alice", "bob");
        let mut sim = Simulation::new(config, world, TracingSink).unwrap();
        sim.start();

        for (i, op) in ops.iter().enumerate() {
            op.apply(&mut sim);
            prop_assert!(
                sim.violations().is_empty(),
                "Violation after operation {} ({:?}): {:?}",
                i, op, sim.violations()
            );
        }

        sim.world_mut().heal();
        if sim.session().status() != SessionStatus::Active {
            sim.control(Control::Restart);
        }
        sim.run_for(Duration::from_secs(60));

        prop_assert!(sim.violations().is_empty(), "{:?}", sim.violations());
        let verdict = settled()(&sim);
        prop_assert!(verdict.is_ok(), "not settled after {:?}: {:?}", ops, verdict);
    }
}
