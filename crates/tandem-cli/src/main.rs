//! Tandem simulator
//!
//! Runs one session against simulated collaborators on a virtual clock,
//! applies a fault plan, and logs every observation the session emits.
//!
//! # Usage
//!
//! ```bash
//! # Healthy session, remote already publishing
//! tandem-sim --remote-stream s7
//!
//! # Drop signaling at 5s, fail the local link at 12.5s
//! tandem-sim --remote-stream s7 --faults "5:drop-signaling,12.5:fail-link=local"
//!
//! # Session config from a JSON file, verbose
//! RUST_LOG=debug tandem-sim --config session.json --seed 42
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use clap::Parser;
use tandem_app::{Control, TracingSink};
use tandem_client::{SessionError, SessionStatus};
use tandem_core::{IceServer, MediaConstraints, SessionConfig};
use tandem_harness::{FaultPlan, SimWorld, Simulation, scenario::settled};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Simulate a two-party media session under injected faults.
#[derive(Parser, Debug)]
#[command(name = "tandem-sim", version, about)]
struct Args {
    /// Room to join
    #[arg(long, default_value = "room-1")]
    room: String,

    /// Local participant id
    #[arg(long, default_value = "alice")]
    user: String,

    /// Remote participant id
    #[arg(long, default_value = "bob")]
    remote: String,

    /// JSON session config; replaces room, user and remote
    #[arg(long)]
    config: Option<PathBuf>,

    /// ICE server URL (repeatable)
    #[arg(long = "ice-server")]
    ice_servers: Vec<String>,

    /// Request audio only
    #[arg(long)]
    audio_only: bool,

    /// Repair backoff in milliseconds
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// Virtual seconds to run
    #[arg(long, default_value = "30")]
    duration: u64,

    /// Seed for collaborator latency
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Minimum collaborator latency in milliseconds
    #[arg(long, default_value = "5")]
    latency_min: u64,

    /// Maximum collaborator latency in milliseconds
    #[arg(long, default_value = "40")]
    latency_max: u64,

    /// Stream the remote participant publishes from the start
    #[arg(long)]
    remote_stream: Option<String>,

    /// Fault plan, e.g. "5:drop-signaling,12.5:fail-link=local"
    #[arg(long)]
    faults: Option<FaultPlan>,

    /// Restart the session this many seconds in if it failed
    #[arg(long)]
    restart_at: Option<u64>,

    /// Only report invariant violations, not whether the session settled
    #[arg(long)]
    no_settle_check: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read { path: PathBuf, source: std::io::Error },

    #[error("invalid config {}: {source}", path.display())]
    Parse { path: PathBuf, source: serde_json::Error },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("latency range {min}..={max} ms is empty")]
    Latency { min: u64, max: u64 },

    #[error("{0} invariant violations")]
    Violations(usize),

    #[error("session did not settle: {0}")]
    Unsettled(String),
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation failed");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: &Path) -> Result<SessionConfig, CliError> {
    let text = fs::read_to_string(path)
        .map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&text)
        .map_err(|source| CliError::Parse { path: path.to_path_buf(), source })
}

fn session_config(args: &Args) -> Result<SessionConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::new(&args.room, &args.user, &args.remote),
    };

    config.ice_servers.extend(args.ice_servers.iter().map(IceServer::new));
    if args.audio_only {
        config.constraints = MediaConstraints::default().audio_only();
    }
    if let Some(millis) = args.backoff_ms {
        config.timing.backoff = Duration::from_millis(millis);
    }
    config.validate().map_err(SessionError::from)?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), CliError> {
    if args.latency_min > args.latency_max {
        return Err(CliError::Latency { min: args.latency_min, max: args.latency_max });
    }

    let config = session_config(args)?;
    let mut world = SimWorld::new(&config.user_id, &config.remote_user_id, args.seed)
        .with_latency(args.latency_min, args.latency_max);
    if let Some(stream) = &args.remote_stream {
        world = world.with_remote_stream(stream);
    }
    let plan = args.faults.clone().unwrap_or_default();

    info!(
        room = %config.room_id,
        user = %config.user_id,
        remote = %config.remote_user_id,
        seed = args.seed,
        faults = %plan,
        "starting simulation"
    );

    let mut sim = Simulation::new(config, world, TracingSink)?.with_plan(&plan);
    let start = sim.now();
    let end = start + Duration::from_secs(args.duration);

    sim.start();
    if let Some(at) = args.restart_at {
        sim.run_until(start + Duration::from_secs(at).min(end - start));
        if sim.session().status() == SessionStatus::Failed {
            info!("restarting failed session");
            sim.world_mut().heal();
            sim.control(Control::Restart);
        }
    }
    sim.run_until(end);

    report(&sim);

    if !sim.violations().is_empty() {
        for violation in sim.violations() {
            warn!(%violation, "invariant violated");
        }
        return Err(CliError::Violations(sim.violations().len()));
    }
    if !args.no_settle_check {
        settled()(&sim).map_err(CliError::Unsettled)?;
    }
    Ok(())
}

fn report(sim: &Simulation<TracingSink>) {
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for observation in sim.history() {
        *counts.entry(observation.name()).or_default() += 1;
    }

    let stats = sim.world().stats();
    info!(
        status = ?sim.session().status(),
        elapsed = ?sim.elapsed(),
        state = %sim.session().state(),
        "simulation finished"
    );
    info!(
        acquisitions = stats.acquisitions,
        signaling_connects = stats.signaling_connects,
        links_created = stats.links_created,
        links_destroyed = stats.links_destroyed,
        remote_candidates = stats.remote_candidates,
        discarded = stats.discarded,
        requests = ?stats.requests,
        "collaborators"
    );
    info!(?counts, "observations");
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tandem_harness::Fault;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tandem-sim").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = args(&[]);
        assert_eq!(args.room, "room-1");
        assert_eq!(args.user, "alice");
        assert_eq!(args.remote, "bob");
        assert_eq!(args.duration, 30);
        assert!(args.faults.is_none());
    }

    #[test]
    fn fault_plan_is_parsed() {
        let args = args(&["--faults", "5:drop-signaling,2:no-camera"]);
        let plan = args.faults.unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.faults()[0].fault, Fault::NoCamera);
    }

    #[test]
    fn bad_fault_plan_is_rejected() {
        let result = Args::try_parse_from(["tandem-sim", "--faults", "5:explode"]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_apply() {
        let args = args(&["--backoff-ms", "250", "--audio-only", "--ice-server", "stun:a"]);
        let config = session_config(&args).unwrap();
        assert_eq!(config.timing.backoff, Duration::from_millis(250));
        assert!(!config.constraints.wants_video());
        assert_eq!(config.ice_servers, vec![IceServer::new("stun:a")]);
    }

    #[test]
    fn same_participant_is_rejected() {
        let args = args(&["--remote", "alice"]);
        assert!(matches!(session_config(&args), Err(CliError::Session(_))));
    }

    #[test]
    fn config_file_is_loaded() {
        let config = SessionConfig::new("lobby", "carol", "dave");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes()).unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let loaded = session_config(&args(&["--config", &path])).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn malformed_config_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let path = file.path().to_str().unwrap().to_owned();
        let result = session_config(&args(&["--config", &path]));
        assert!(matches!(result, Err(CliError::Parse { .. })));
    }

    #[test]
    fn faulty_run_settles() {
        let plan = "5:drop-signaling,9:fail-link=local";
        let args = args(&["--remote-stream", "s7", "--faults", plan]);
        run(&args).unwrap();
    }

    #[test]
    fn unavailable_media_is_reported_unless_restarted() {
        let failing = args(&["--faults", "0:media-unavailable"]);
        assert!(matches!(run(&failing), Err(CliError::Unsettled(_))));

        let restarted = args(&["--faults", "0:media-unavailable", "--restart-at", "10"]);
        run(&restarted).unwrap();
    }

    #[test]
    fn inverted_latency_is_rejected() {
        let args = args(&["--latency-min", "50", "--latency-max", "10"]);
        assert!(matches!(run(&args), Err(CliError::Latency { min: 50, max: 10 })));
    }
}
