//! Error type shared by the input core and its collaborators
//!
//! None of these are fatal: the session logs them and carries on as if no
//! selection happened.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A collaborator did not answer within the caller's budget
    #[error("provider timed out after {0:?}")]
    ProviderTimeout(Duration),

    /// A collaborator answered with an error
    #[error("provider error: {0}")]
    Provider(String),

    /// A commit referenced an id that is not in the current layout
    #[error("target '{0}' is not in the current layout")]
    InvalidTarget(String),

    /// A timer or response carried a superseded generation
    #[error("stale commit: generation {generation}, current {current}")]
    StaleCommit { generation: u64, current: u64 },

    #[error("transcription failed: {0}")]
    Transcription(String),

    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
