use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Destination directory {path:?} is not usable: {reason}")]
    DestinationUnusable { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, AppError>;
