//! # Twisty Application Logic
//!
//! Sets up logging, resolves the configuration from the command line and an
//! optional JSON file, runs the rollouts and reports a summary.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rl::EnvConfig;
use tracing_subscriber::EnvFilter;
use twisty::{rollout, Backend, Policy, RolloutOptions, Summary};

/// Roll out a walker policy towards randomly placed goals.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Creature model to load.
    #[arg(long, default_value = "models/quadruped.json")]
    pub model: PathBuf,

    /// Simulator to run the model on.
    #[arg(long, value_enum, default_value_t = Backend::Kinematic)]
    pub backend: Backend,

    /// JSON file overriding environment defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 1)]
    pub episodes: usize,

    /// Base seed; worker `i` uses `seed + i`. Random when neither this nor
    /// the config file sets one.
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = Policy::Zero)]
    pub policy: Policy,

    /// Number of independent environments run in parallel.
    #[arg(long, default_value_t = 1)]
    pub workers: usize,

    /// Connect interactively and pace steps in real time.
    #[arg(long)]
    pub render: bool,
}

/// Runs the rollouts described by `args`.
///
/// # Errors
///
/// Returns configuration, model loading and environment errors.
pub fn run(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match &args.config {
        Some(path) => EnvConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EnvConfig::default(),
    };
    let seed = args
        .seed
        .or(config.seed)
        .unwrap_or_else(|| fastrand::u64(..));

    let mut workers = args.workers.max(1);
    if args.render && workers > 1 {
        tracing::warn!("--render runs a single worker, ignoring --workers {workers}");
        workers = 1;
    }

    tracing::info!(
        "Rolling out {} episode(s) of {:?} policy on {} ({:?}), seed {seed}, {workers} worker(s)",
        args.episodes,
        args.policy,
        args.model.display(),
        args.backend
    );
    let stats = rollout(&RolloutOptions {
        model: args.model,
        backend: args.backend,
        config,
        episodes: args.episodes,
        seed,
        policy: args.policy,
        workers,
        render: args.render,
    })?;

    let summary = Summary::from_stats(&stats);
    tracing::info!(
        "Finished {} episode(s): mean return {:.2}, mean length {:.1}, success rate {:.0}%",
        summary.episodes,
        summary.mean_return,
        summary.mean_length,
        summary.success_rate * 100.0
    );
    Ok(())
}
