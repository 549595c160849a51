#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod config;
pub mod episode;
pub mod error;
pub mod fsutil;
pub mod mover;
pub mod naming;
pub mod observer;
pub mod parser;
pub mod patterns;
pub mod runner;

pub use cli::{Cli, Commands};
pub use config::{ConfigError, Settings, default_config_path};
pub use episode::{
    EpisodePlacement, FileEpisode, MoveStatus, ParseFailure, ParseResult, ParsedEpisode,
    normalize_show_name,
};
pub use error::{AppError, Result};
pub use mover::{FileMover, MoveOutcome, MoveResult};
pub use naming::NamingEngine;
pub use observer::{
    LogMoveObserver, LogProgressUpdater, MoveObserver, NoopMoveObserver, NoopProgressUpdater,
    ProgressUpdater,
};
pub use runner::{MoveReport, MoveRunner, TaskOutcome};
