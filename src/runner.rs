use crate::config::Settings;
use crate::episode::{EpisodePlacement, FileEpisode, MoveStatus};
use crate::fsutil;
use crate::mover::{FileMover, MoveOutcome, MoveResult};
use crate::observer::ProgressUpdater;
use crate::parser;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How often the monitor wakes up to notice a shutdown request while a
/// move is still running.
const MONITOR_POLL: Duration = Duration::from_millis(200);

/// What the batch has to say about one submitted move.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The mover ran to a terminal state (which may itself be a failure).
    Completed(MoveResult),
    /// Dropped from the queue before it started.
    Cancelled(FileEpisode),
    /// Still running when its deadline passed and never reported back.
    Unfinished { source: PathBuf },
}

/// Batch result, one outcome per submitted mover in submission order, plus
/// the aggregated duplicate candidates for the caller to confirm.
#[derive(Debug)]
pub struct MoveReport {
    pub outcomes: Vec<TaskOutcome>,
    pub duplicates: Vec<PathBuf>,
}

impl MoveReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                matches!(o, TaskOutcome::Completed(r) if r.episode.status().is_success())
            })
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Executes a batch of file moves on one background worker.
///
/// All conflict resolution happens in `new`, before any I/O runs: every
/// mover's destination name is fixed by the time the worker starts, so the
/// worker never races itself over a name. `run` then drains the queue with
/// a per-task deadline and cooperative cancellation.
pub struct MoveRunner {
    movers: Vec<FileMover>,
    settings: Arc<Settings>,
    shutdown: Arc<AtomicBool>,
}

impl MoveRunner {
    /// Planning only reads the destination tree. Directory creation and
    /// the writability probe wait for `run`, so printing a plan for a dry
    /// run leaves the filesystem untouched.
    pub fn new(mut movers: Vec<FileMover>, settings: Arc<Settings>) -> Self {
        // With unconditional overwrite there is nothing to disambiguate;
        // the move step replaces whatever is in the way.
        if !settings.overwrite_existing {
            assign_conflict_indices(&mut movers);
        }
        Self {
            movers,
            settings,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the batch: queued movers are dropped, the in-flight
    /// one is interrupted at its next copy chunk.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// `(source, destination)` pairs as they will execute, for dry runs and
    /// confirmation prompts.
    pub fn planned_moves(&self) -> Vec<(PathBuf, PathBuf)> {
        self.movers
            .iter()
            .map(|m| (m.source().to_path_buf(), m.desired_destination()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.movers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.movers.len()
    }

    /// Execute every mover in submission order and wait for the batch to
    /// settle. Individual failures never abort siblings; only the shutdown
    /// flag stops the queue early.
    pub fn run(mut self, updater: &dyn ProgressUpdater) -> MoveReport {
        preverify_directories(&mut self.movers);

        let total = self.movers.len();
        let timeout = self.settings.task_timeout();
        let interrupts: Vec<Arc<AtomicBool>> = self
            .movers
            .iter()
            .map(FileMover::interrupt_handle)
            .collect();
        let sources: Vec<PathBuf> = self
            .movers
            .iter()
            .map(|m| m.source().to_path_buf())
            .collect();

        updater.set_progress(total, total);

        let (tx, rx) = mpsc::channel::<(usize, TaskOutcome)>();
        let movers = std::mem::take(&mut self.movers);
        let shutdown = Arc::clone(&self.shutdown);
        let worker = thread::Builder::new()
            .name("tvshelf-mover".to_string())
            .spawn(move || {
                for (i, mover) in movers.into_iter().enumerate() {
                    if shutdown.load(Ordering::Relaxed) {
                        debug!("Skipping queued move of {}", mover.source().display());
                        let outcome = TaskOutcome::Cancelled(mover.into_episode());
                        if tx.send((i, outcome)).is_err() {
                            break;
                        }
                        continue;
                    }
                    if tx.send((i, execute_guarded(mover))).is_err() {
                        break;
                    }
                }
            });

        let mut slots: Vec<Option<TaskOutcome>> = (0..total).map(|_| None).collect();
        let mut settled = 0usize;
        let mut oldest_pending = 0usize;
        let mut waited = Duration::ZERO;
        let mut interrupts_fired = false;

        while settled < total {
            match rx.recv_timeout(MONITOR_POLL.min(timeout)) {
                Ok((i, outcome)) => {
                    // A task that already timed out may still report in;
                    // its real outcome replaces the provisional one.
                    if slots[i].is_none() {
                        settled += 1;
                        updater.set_progress(total, total - settled);
                    }
                    slots[i] = Some(outcome);
                    while oldest_pending < total && slots[oldest_pending].is_some() {
                        oldest_pending += 1;
                    }
                    waited = Duration::ZERO;
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.load(Ordering::Relaxed) && !interrupts_fired {
                        info!("Shutdown requested, interrupting outstanding moves");
                        for (i, flag) in interrupts.iter().enumerate() {
                            if slots[i].is_none() {
                                flag.store(true, Ordering::Relaxed);
                            }
                        }
                        interrupts_fired = true;
                    }
                    waited += MONITOR_POLL.min(timeout);
                    if waited >= timeout && oldest_pending < total {
                        warn!(
                            "Move of {} exceeded {}s, interrupting",
                            sources[oldest_pending].display(),
                            timeout.as_secs()
                        );
                        interrupts[oldest_pending].store(true, Ordering::Relaxed);
                        slots[oldest_pending] = Some(TaskOutcome::Unfinished {
                            source: sources[oldest_pending].clone(),
                        });
                        settled += 1;
                        updater.set_progress(total, total - settled);
                        while oldest_pending < total && slots[oldest_pending].is_some() {
                            oldest_pending += 1;
                        }
                        waited = Duration::ZERO;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // The worker died without reporting everything; the
                    // unreported tasks are lost, not secretly still moving.
                    for (i, slot) in slots.iter_mut().enumerate() {
                        if slot.is_none() {
                            *slot = Some(TaskOutcome::Unfinished {
                                source: sources[i].clone(),
                            });
                            settled += 1;
                        }
                    }
                    updater.set_progress(total, total - settled);
                }
            }
        }
        drop(rx);
        // A worker stuck in unkillable I/O holds its thread until the
        // process exits; everything it still owned is already reported as
        // Unfinished, so joining is only safe when it actually returned.
        if let Ok(handle) = worker {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        updater.finish();

        let outcomes: Vec<TaskOutcome> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or(TaskOutcome::Unfinished { source: PathBuf::new() }))
            .collect();
        let duplicates = aggregate_duplicates(&outcomes);
        MoveReport {
            outcomes,
            duplicates,
        }
    }
}

/// Run one mover, containing any panic inside it. A panicking task is
/// reported as its own move failure; the worker and the rest of the queue
/// keep going.
fn execute_guarded(mover: FileMover) -> TaskOutcome {
    let source = mover.source().to_path_buf();
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| mover.execute())) {
        Ok(result) => TaskOutcome::Completed(result),
        Err(panic) => {
            let reason = panic_reason(panic.as_ref());
            tracing::error!("Move of {} panicked: {reason}", source.display());
            let mut episode = FileEpisode::new(source);
            episode.set_status(MoveStatus::FailedToMove);
            TaskOutcome::Completed(MoveResult {
                outcome: MoveOutcome::Failed {
                    reason: format!("panicked: {reason}"),
                },
                actual_destination: None,
                mtime_failure: false,
                duplicates: Vec::new(),
                episode,
            })
        }
    }
}

fn panic_reason(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Union of every task's discovered duplicates, minus anything the batch
/// itself just placed. A file the runner moved in is never a duplicate of
/// itself.
fn aggregate_duplicates(outcomes: &[TaskOutcome]) -> Vec<PathBuf> {
    let own_destinations: HashSet<&Path> = outcomes
        .iter()
        .filter_map(|o| match o {
            TaskOutcome::Completed(r) => r.actual_destination.as_deref(),
            _ => None,
        })
        .collect();

    let mut found = BTreeSet::new();
    for outcome in outcomes {
        if let TaskOutcome::Completed(result) = outcome {
            for dup in &result.duplicates {
                if !own_destinations.contains(dup.as_path()) {
                    found.insert(dup.clone());
                }
            }
        }
    }
    found.into_iter().collect()
}

/// Resolve naming conflicts before anything runs.
///
/// Movers are grouped by destination directory and normalized basename, so
/// files that differ only by extension compete for one identity. Each
/// group is checked against the destination directory once, counting
/// existing files that collide by stem or by parsed episode slot. Groups
/// with more than one claimant get `" (N)"` indices: the largest new file
/// stays unsuffixed, the rest follow in descending size order, numbered
/// after the existing occupants.
fn assign_conflict_indices(movers: &mut [FileMover]) {
    let mut groups: HashMap<(PathBuf, String), Vec<usize>> = HashMap::new();
    for (i, mover) in movers.iter().enumerate() {
        let key = (
            mover.dest_dir().to_path_buf(),
            mover.basename().to_lowercase(),
        );
        groups.entry(key).or_default().push(i);
    }

    for ((dir, base), mut members) in groups {
        let slots: Vec<EpisodePlacement> = members
            .iter()
            .filter_map(|&i| movers[i].episode().placement())
            .collect();
        let existing = count_existing_conflicts(&dir, &base, &slots);

        if members.len() + existing <= 1 {
            continue;
        }
        debug!(
            "{} pending and {existing} existing files compete for {:?} in {}",
            members.len(),
            base,
            dir.display()
        );

        // Stable sort keeps discovery order among equal sizes.
        members.sort_by_key(|&i| std::cmp::Reverse(movers[i].size()));
        let mut counter = u32::try_from(existing).unwrap_or(u32::MAX);
        for &i in &members {
            counter = counter.saturating_add(1);
            // Counter 1 renders as the plain, unsuffixed name.
            movers[i].set_index(Some(counter));
        }
    }
}

/// How many files already in `dir` claim the same identity: an equal stem
/// under any extension, or a filename whose parsed season/episode lands on
/// one of the group's slots.
fn count_existing_conflicts(dir: &Path, base: &str, slots: &[EpisodePlacement]) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut count = 0;
    for entry in entries.flatten() {
        if !entry.file_type().is_ok_and(|t| t.is_file()) {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if stem == base {
            count += 1;
            continue;
        }
        if let Some(placement) = parser::parse_season_episode(&name) {
            if slots.iter().any(|slot| slot.same_slot(&placement)) {
                count += 1;
            }
        }
    }
    count
}

/// Create and probe each unique destination directory once, and tell its
/// movers so they skip the per-move check. A directory that fails the
/// probe is left unverified; its movers rediscover the problem and report
/// it as their own failure.
fn preverify_directories(movers: &mut [FileMover]) {
    let dirs: BTreeSet<PathBuf> = movers.iter().map(|m| m.dest_dir().to_path_buf()).collect();
    let mut verified = HashSet::new();
    for dir in dirs {
        match fsutil::ensure_writable_dir(&dir) {
            Ok(()) => {
                verified.insert(dir);
            }
            Err(e) => warn!("{e}"),
        }
    }
    for mover in movers.iter_mut() {
        if verified.contains(mover.dest_dir()) {
            mover.mark_pre_verified();
        }
    }
}
