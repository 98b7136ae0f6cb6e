use crate::core::video::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SelectorError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("No frames could be extracted from {0}")]
    EmptySource(String),
    #[error("Target unreachable: {target} frames requested but only {available} extracted")]
    TargetUnreachable { target: usize, available: usize },
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Config parse error: {0}")]
    ConfigParse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Environment has not been reset")]
    NotReset,
    #[error("Episode already finished, call reset first")]
    EpisodeFinished,
    #[error("Invalid frame range {start}..{end} (episode has {len} frames)")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("Invalid action: {0}")]
    InvalidAction(i64),
}
