//! # Rollouts
//!
//! Runs whole episodes against a [`WalkerEnv`] with a fixed policy and
//! collects per-episode statistics. Several workers can run side by side,
//! each owning its own environment and backend of the chosen [`Backend`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ValueEnum;
use physics::{ConnectionMode, KinematicBackend, PhysicsBackend, RapierBackend};
use rl::{EnvConfig, EnvError, WalkerEnv};
use tracing::{debug, info};

/// Action source for a rollout.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Every joint held at the middle of its range.
    Zero,
    /// Uniform actions in `[-1, 1]`.
    Random,
}

impl Policy {
    fn act(self, rng: &mut fastrand::Rng, action: &mut [f32]) {
        match self {
            Self::Zero => action.fill(0.0),
            Self::Random => action.iter_mut().for_each(|a| *a = rng.f32() * 2.0 - 1.0),
        }
    }
}

/// Simulator behind every worker's environment.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Deterministic kinematic model; fast, no contact dynamics.
    #[default]
    Kinematic,
    /// Rigid-body simulation on the rapier engine.
    Rapier,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeStats {
    pub episode: usize,
    pub worker: usize,
    pub steps: u32,
    pub total_reward: f32,
    pub final_distance: f32,
    pub reached: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub episodes: usize,
    pub mean_return: f32,
    pub mean_length: f32,
    pub success_rate: f32,
}

impl Summary {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_stats(stats: &[EpisodeStats]) -> Self {
        if stats.is_empty() {
            return Self {
                episodes: 0,
                mean_return: 0.0,
                mean_length: 0.0,
                success_rate: 0.0,
            };
        }
        let n = stats.len() as f32;
        Self {
            episodes: stats.len(),
            mean_return: stats.iter().map(|s| s.total_reward).sum::<f32>() / n,
            mean_length: stats.iter().map(|s| s.steps as f32).sum::<f32>() / n,
            success_rate: stats.iter().filter(|s| s.reached).count() as f32 / n,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RolloutOptions {
    pub model: PathBuf,
    pub backend: Backend,
    pub config: EnvConfig,
    pub episodes: usize,
    pub seed: u64,
    pub policy: Policy,
    pub workers: usize,
    pub render: bool,
}

/// Runs one episode from reset to the terminal step. The returned stats
/// carry episode and worker index 0; callers fill in their own.
///
/// # Errors
///
/// Propagates any environment failure.
pub fn run_episode<B: PhysicsBackend>(
    env: &mut WalkerEnv<B>,
    policy: Policy,
    rng: &mut fastrand::Rng,
    render: bool,
) -> Result<EpisodeStats, EnvError> {
    env.reset()?;
    let mut action = vec![0.0; env.action_space().dim];
    let mut total_reward = 0.0;
    loop {
        policy.act(rng, &mut action);
        let step = env.step(&action)?;
        total_reward += step.reward;
        if render {
            env.render();
        }
        if step.done {
            break;
        }
    }
    let final_distance = env.goal_distance()?;
    Ok(EpisodeStats {
        episode: 0,
        worker: 0,
        steps: env.step_count(),
        total_reward,
        final_distance,
        reached: final_distance <= env.config().goal_achieved_distance,
    })
}

/// Episodes handled by `worker`: every `workers`-th index starting at `worker`.
fn episodes_for(worker: usize, workers: usize, episodes: usize) -> impl Iterator<Item = usize> {
    (worker..episodes).step_by(workers.max(1))
}

fn run_worker(
    worker: usize,
    workers: usize,
    options: &RolloutOptions,
) -> Result<Vec<EpisodeStats>> {
    match options.backend {
        Backend::Kinematic => run_worker_on::<KinematicBackend>(worker, workers, options),
        Backend::Rapier => run_worker_on::<RapierBackend>(worker, workers, options),
    }
}

fn run_worker_on<B: PhysicsBackend>(
    worker: usize,
    workers: usize,
    options: &RolloutOptions,
) -> Result<Vec<EpisodeStats>> {
    let mode = if options.render {
        ConnectionMode::Interactive
    } else {
        ConnectionMode::Headless
    };
    let mut env: WalkerEnv<B> =
        WalkerEnv::new(&options.model, options.config.clone(), mode).with_context(|| {
            format!("worker {worker}: failed to load {}", options.model.display())
        })?;
    let seed = env.seed(options.seed.wrapping_add(worker as u64));
    let mut rng = fastrand::Rng::with_seed(seed.rotate_left(32));
    debug!("Worker {worker} seeded with {seed}");

    let mut stats = Vec::new();
    for episode in episodes_for(worker, workers, options.episodes) {
        let outcome = run_episode(&mut env, options.policy, &mut rng, options.render)
            .with_context(|| format!("worker {worker}: episode {episode} failed"))?;
        info!(
            "Episode {episode} (worker {worker}): {} steps, return {:.2}, dist {:.2}, reached {}",
            outcome.steps,
            outcome.total_reward,
            outcome.final_distance,
            outcome.reached
        );
        stats.push(EpisodeStats {
            episode,
            worker,
            ..outcome
        });
    }
    env.close();
    Ok(stats)
}

/// Runs `options.episodes` episodes spread over `options.workers` threads.
/// Statistics come back ordered by episode index.
///
/// # Errors
///
/// Fails if any worker fails to build its environment or to finish an
/// episode.
pub fn rollout(options: &RolloutOptions) -> Result<Vec<EpisodeStats>> {
    let workers = options.workers.clamp(1, options.episodes.max(1));
    let mut stats = if workers == 1 {
        run_worker(0, 1, options)?
    } else {
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| scope.spawn(move || run_worker(worker, workers, options)))
                .collect();
            let mut all = Vec::with_capacity(options.episodes);
            for (worker, handle) in handles.into_iter().enumerate() {
                let batch = handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("worker {worker} panicked"))??;
                all.extend(batch);
            }
            Ok::<_, anyhow::Error>(all)
        })?
    };
    stats.sort_by_key(|s| s.episode);
    Ok(stats)
}
