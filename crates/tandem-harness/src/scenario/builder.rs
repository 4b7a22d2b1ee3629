//! Scenario builder API.
//!
//! Provides a declarative API for constructing scenario tests that enforce
//! the Oracle Pattern.

use std::time::Duration;

use tandem_app::{Control, TracingSink};
use tandem_core::SessionConfig;

use crate::{
    Fault, FaultPlan, SimWorld, Simulation,
    scenario::{OracleFn, ScenarioSim},
};

/// Scenario builder.
///
/// Configure the session and its world, then call `.oracle()` to get a
/// [`RunnableScenario`].
pub struct Scenario {
    name: String,
    config: SessionConfig,
    seed: u64,
    latency_ms: (u64, u64),
    remote_stream: Option<String>,
    plan: FaultPlan,
    controls: Vec<(Duration, Control)>,
    duration: Duration,
}

impl Scenario {
    /// Scenario where "alice" expects "bob" in "room-1", running for 30
    /// virtual seconds.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: SessionConfig::new("room-1", "alice", "bob"),
            seed: 0,
            latency_ms: (5, 40),
            remote_stream: None,
            plan: FaultPlan::new(),
            controls: Vec::new(),
            duration: Duration::from_secs(30),
        }
    }

    /// Replace the session configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Tweak the session configuration.
    #[must_use]
    pub fn configure(mut self, tweak: impl FnOnce(&mut SessionConfig)) -> Self {
        tweak(&mut self.config);
        self
    }

    /// Seed for collaborator latency.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Collaborator latency range in milliseconds.
    #[must_use]
    pub fn latency(mut self, min: u64, max: u64) -> Self {
        self.latency_ms = (min, max);
        self
    }

    /// The remote participant is in the room from the start, publishing
    /// `stream`.
    #[must_use]
    pub fn remote_publishing(mut self, stream: impl Into<String>) -> Self {
        self.remote_stream = Some(stream.into());
        self
    }

    /// Inject `fault` at `at` after start.
    #[must_use]
    pub fn fault(mut self, at: Duration, fault: Fault) -> Self {
        self.plan.push(at, fault);
        self
    }

    /// Inject every fault of `plan`.
    #[must_use]
    pub fn faults(mut self, plan: &FaultPlan) -> Self {
        for scheduled in plan.faults() {
            self.plan.push(scheduled.at, scheduled.fault);
        }
        self
    }

    /// Issue an application command at `at` after start.
    #[must_use]
    pub fn control(mut self, at: Duration, control: Control) -> Self {
        let index = self.controls.partition_point(|(when, _)| *when <= at);
        self.controls.insert(index, (at, control));
        self
    }

    /// Total virtual run time.
    #[must_use]
    pub fn run_for(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the oracle function and return a runnable scenario.
    ///
    /// The oracle is mandatory - you cannot run a scenario without
    /// verification.
    pub fn oracle(self, oracle: OracleFn) -> RunnableScenario {
        RunnableScenario { scenario: self, oracle }
    }
}

/// A scenario with an oracle function that can be executed.
pub struct RunnableScenario {
    scenario: Scenario,
    oracle: OracleFn,
}

impl RunnableScenario {
    /// Execute the scenario.
    ///
    /// Starts the session, runs virtual time to the end while applying the
    /// fault plan and commands, then checks invariants and runs the oracle.
    pub fn run(self) -> Result<(), String> {
        let sim = self.simulate()?;
        let name = &self.scenario.name;

        if let Some(violation) = sim.violations().first() {
            return Err(format!("Scenario '{name}': invariant violated {violation}"));
        }
        (self.oracle)(&sim).map_err(|e| format!("Scenario '{name}': {e}"))
    }

    fn simulate(&self) -> Result<ScenarioSim, String> {
        let scenario = &self.scenario;
        let (min, max) = scenario.latency_ms;

        let mut world =
            SimWorld::new(&scenario.config.user_id, &scenario.config.remote_user_id, scenario.seed)
                .with_latency(min, max);
        if let Some(stream) = &scenario.remote_stream {
            world = world.with_remote_stream(stream);
        }

        let mut sim = Simulation::new(scenario.config.clone(), world, TracingSink)
            .map_err(|e| format!("Scenario '{}': {e}", scenario.name))?
            .with_plan(&scenario.plan);

        let start = sim.now();
        sim.start();
        for (at, control) in &scenario.controls {
            sim.run_until(start + *at);
            sim.control(*control);
        }
        sim.run_until(start + scenario.duration);

        Ok(sim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_requires_oracle() {
        // This should compile - oracle provided
        let _scenario = Scenario::new("test").oracle(Box::new(|_sim| Ok(())));

        // This should NOT compile - no oracle
        // let scenario = Scenario::new("test");
        // scenario.run(); // ERROR: no method `run` on type `Scenario`
    }

    #[test]
    fn oracle_failure_names_the_scenario() {
        let result = Scenario::new("doomed")
            .run_for(Duration::from_secs(1))
            .oracle(Box::new(|_sim| Err("nope".into())))
            .run();
        assert_eq!(result, Err("Scenario 'doomed': nope".to_string()));
    }

    #[test]
    fn invalid_config_is_reported() {
        let result = Scenario::new("same-user")
            .configure(|config| config.remote_user_id = "alice".into())
            .oracle(Box::new(|_sim| Ok(())))
            .run();
        assert!(result.is_err());
    }
}
