use crate::episode::FileEpisode;
use tracing::{debug, warn};

/// Per-file progress sink, carried into the worker thread with its move.
pub trait MoveObserver: Send {
    /// Called once before a copy starts, with the total byte count.
    fn initialize_progress(&mut self, max_bytes: u64);
    /// Called with the running byte count as a copy proceeds.
    fn set_progress_value(&mut self, bytes: u64);
    /// Short human-readable phase changes ("verifying", "copying", ...).
    fn set_progress_status(&mut self, status: &str);
    /// Called exactly once when the move reaches a terminal status.
    fn finish_progress(&mut self, episode: &FileEpisode);
}

/// Whole-run progress sink for the monitor loop.
pub trait ProgressUpdater: Send {
    fn set_progress(&self, total: usize, remaining: usize);
    fn finish(&self);
}

pub struct NoopMoveObserver;

impl MoveObserver for NoopMoveObserver {
    fn initialize_progress(&mut self, _max_bytes: u64) {}
    fn set_progress_value(&mut self, _bytes: u64) {}
    fn set_progress_status(&mut self, _status: &str) {}
    fn finish_progress(&mut self, _episode: &FileEpisode) {}
}

pub struct LogMoveObserver;

impl MoveObserver for LogMoveObserver {
    fn initialize_progress(&mut self, max_bytes: u64) {
        debug!("Copying {max_bytes} bytes");
    }

    fn set_progress_value(&mut self, bytes: u64) {
        debug!("Copied {bytes} bytes");
    }

    fn set_progress_status(&mut self, status: &str) {
        debug!("{status}");
    }

    fn finish_progress(&mut self, episode: &FileEpisode) {
        if episode.status().is_success() {
            debug!("Finished {} ({})", episode.path().display(), episode.status());
        } else {
            warn!("Move of {} ended {}", episode.path().display(), episode.status());
        }
    }
}

pub struct NoopProgressUpdater;

impl ProgressUpdater for NoopProgressUpdater {
    fn set_progress(&self, _total: usize, _remaining: usize) {}
    fn finish(&self) {}
}

pub struct LogProgressUpdater;

impl ProgressUpdater for LogProgressUpdater {
    fn set_progress(&self, total: usize, remaining: usize) {
        debug!("{} of {total} moves outstanding", remaining);
    }

    fn finish(&self) {
        debug!("All moves settled");
    }
}
