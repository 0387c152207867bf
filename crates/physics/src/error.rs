use std::path::PathBuf;

use thiserror::Error;

use crate::types::BodyHandle;

/// Failures reported by a [`PhysicsBackend`](crate::PhysicsBackend).
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend connection is closed")]
    NotConnected,
    #[error("failed to read model file {path}")]
    ModelIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model {path}")]
    ModelParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    InvalidModel(String),
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("body {body:?} has no joint {joint}")]
    UnknownJoint { body: BodyHandle, joint: usize },
    #[error("body {body:?} has no link {link}")]
    UnknownLink { body: BodyHandle, link: usize },
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}
