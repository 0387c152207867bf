use std::path::PathBuf;

use physics::BackendError;
use thiserror::Error;

/// Everything that can go wrong while building or driving a [`WalkerEnv`].
///
/// Contract violations (`ActionLength`, `NonFiniteAction`, `TargetOverflow`,
/// `NotReset`, `EpisodeDone`, `Closed`) fail only the offending call and
/// leave the environment state untouched.
///
/// [`WalkerEnv`]: crate::WalkerEnv
#[derive(Error, Debug)]
pub enum EnvError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("joint {joint} has a degenerate position range [{lower}, {upper}]")]
    DegenerateJoint {
        joint: usize,
        lower: f32,
        upper: f32,
    },
    #[error("expected {expected} action components, got {actual}")]
    ActionLength { expected: usize, actual: usize },
    #[error("action component {index} is not finite ({value})")]
    NonFiniteAction { index: usize, value: f32 },
    #[error("action component {index} ({value}) maps to a non-finite joint target")]
    TargetOverflow { index: usize, value: f32 },
    #[error("step called before a successful reset")]
    NotReset,
    #[error("episode is done; reset before stepping again")]
    EpisodeDone,
    #[error("environment is closed")]
    Closed,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("failed to read configuration file {path}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration")]
    ConfigParse(#[from] serde_json::Error),
}
