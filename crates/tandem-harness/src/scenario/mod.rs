//! Scenario testing with mandatory oracles.
//!
//! A [`Scenario`] describes the room, the remote participant, timing, faults
//! and application commands. It can only be run after an oracle has been
//! attached, so every scenario verifies its outcome. Invariant violations
//! detected during the run fail the scenario before the oracle is asked.

mod builder;

pub use builder::{RunnableScenario, Scenario};
use tandem_app::TracingSink;
use tandem_core::{ChannelState, LinkState};

use crate::Simulation;

/// The simulation a scenario runs.
pub type ScenarioSim = Simulation<TracingSink>;

/// Oracle verifying the final simulation state.
pub type OracleFn = Box<dyn Fn(&ScenarioSim) -> Result<(), String>>;

/// Oracle: every subsystem is healthy. With a remote participant in the room
/// its stream must also be received and playing.
pub fn settled() -> OracleFn {
    Box::new(|sim| {
        let state = sim.session().state();
        let healthy = state.signal() == ChannelState::Connected
            && state.room() == ChannelState::Connected
            && state.local_link() == LinkState::Connected;
        if !healthy {
            return Err(format!("session not settled: {state}"));
        }

        if sim.world().remote_in_room() {
            let expected = sim.world().remote_stream();
            let seen = state.remote_peer().map(|peer| peer.stream_id.as_str());
            if seen != expected {
                return Err(format!("remote stream {seen:?}, room has {expected:?}"));
            }
            if state.remote_link() != LinkState::Connected || !state.remote_playing() {
                return Err(format!("remote not playing: {state}"));
            }
        } else if state.remote_present() {
            return Err(format!("remote present but not in room: {state}"));
        }

        Ok(())
    })
}
