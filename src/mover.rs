use crate::config::Settings;
use crate::episode::{FileEpisode, MoveStatus, normalize_show_name};
use crate::fsutil;
use crate::observer::{MoveObserver, NoopMoveObserver};
use crate::parser;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;

/// Minimum normalized show-name similarity for the duplicate scan.
const DUPLICATE_SIMILARITY: f64 = 0.5;

/// How one file's move ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Renamed on the same filesystem.
    Renamed,
    /// Copied across filesystems, verified, source removed.
    Copied,
    /// The destination already was this exact file.
    AlreadyInPlace,
    /// The move stands, but it landed under a different name than asked.
    Misnamed { actual: PathBuf },
    /// Source disappeared before the move started.
    NoSourceFile,
    Failed { reason: String },
}

/// Everything the runner needs back from a finished move. Ownership of the
/// episode record travels with it.
#[derive(Debug)]
pub struct MoveResult {
    pub outcome: MoveOutcome,
    pub actual_destination: Option<PathBuf>,
    pub mtime_failure: bool,
    pub duplicates: Vec<PathBuf>,
    pub episode: FileEpisode,
}

/// Moves a single episode file to its computed destination.
///
/// A mover runs at most once; `execute` consumes it. The source file is
/// never deleted unless the destination verifiably holds the full content.
pub struct FileMover {
    episode: FileEpisode,
    dest_dir: PathBuf,
    basename: String,
    size: u64,
    index: Option<u32>,
    pre_verified: bool,
    force_copy: bool,
    settings: Arc<Settings>,
    interrupt: Arc<AtomicBool>,
    observer: Box<dyn MoveObserver>,
}

impl FileMover {
    pub fn new(
        episode: FileEpisode,
        dest_dir: PathBuf,
        basename: String,
        settings: Arc<Settings>,
    ) -> Self {
        let size = fs::metadata(episode.path()).map_or(0, |m| m.len());
        Self {
            episode,
            dest_dir,
            basename,
            size,
            index: None,
            pre_verified: false,
            force_copy: false,
            settings,
            interrupt: Arc::new(AtomicBool::new(false)),
            observer: Box::new(NoopMoveObserver),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Box<dyn MoveObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn episode(&self) -> &FileEpisode {
        &self.episode
    }

    pub fn source(&self) -> &Path {
        self.episode.path()
    }

    /// Destination directory before duplicate routing.
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    /// Source size in bytes, 0 when the file is gone.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Disambiguation index; values above 1 append `" (N)"` to the name.
    pub fn set_index(&mut self, index: Option<u32>) {
        self.index = index;
    }

    /// The runner checked this mover's destination directory already.
    pub fn mark_pre_verified(&mut self) {
        self.episode.set_status(MoveStatus::Verifying);
        self.pre_verified = true;
    }

    /// Flag handle used to abort this move between copy chunks.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Where this move wants to put the file, for planning output.
    pub fn desired_destination(&self) -> PathBuf {
        self.routed_dir().join(self.indexed_name())
    }

    /// Give the episode record back without running the move. Used when a
    /// queued move is cancelled before it starts.
    pub fn into_episode(self) -> FileEpisode {
        self.episode
    }

    #[cfg(test)]
    fn set_force_copy(&mut self) {
        self.force_copy = true;
    }

    /// Run the move to completion and report the result.
    pub fn execute(mut self) -> MoveResult {
        self.episode.set_status(MoveStatus::Moving);

        let mut mtime_failure = false;
        let mut duplicates = Vec::new();
        let (outcome, actual) = self.run(&mut mtime_failure, &mut duplicates);

        let status = match &outcome {
            MoveOutcome::Renamed => MoveStatus::Renamed,
            MoveOutcome::Copied => MoveStatus::Copied,
            MoveOutcome::AlreadyInPlace => MoveStatus::AlreadyInPlace,
            MoveOutcome::Misnamed { .. } => MoveStatus::Misnamed,
            MoveOutcome::NoSourceFile => MoveStatus::NoFileFound,
            MoveOutcome::Failed { .. } => MoveStatus::FailedToMove,
        };
        self.episode.set_status(status);
        if status.is_success() || matches!(outcome, MoveOutcome::Misnamed { .. }) {
            if let Some(actual) = &actual {
                self.episode.set_moved_to(actual.clone());
            }
        }

        self.observer.finish_progress(&self.episode);
        MoveResult {
            outcome,
            actual_destination: actual,
            mtime_failure,
            duplicates,
            episode: self.episode,
        }
    }

    fn run(
        &mut self,
        mtime_failure: &mut bool,
        duplicates: &mut Vec<PathBuf>,
    ) -> (MoveOutcome, Option<PathBuf>) {
        // Step 1: the source must still be there
        let source = self.episode.path().to_path_buf();
        if !source.exists() {
            tracing::warn!("Source file does not exist: {}", source.display());
            return (MoveOutcome::NoSourceFile, None);
        }

        // Step 2: resolve the real source path
        let source = match fs::canonicalize(&source) {
            Ok(path) => path,
            Err(e) => {
                return (
                    MoveOutcome::Failed {
                        reason: format!("cannot resolve source path: {e}"),
                    },
                    None,
                );
            }
        };

        // Step 3: compute the destination, with index suffix and routing
        let dest_dir = self.routed_dir();
        let dest_name = self.indexed_name();
        let routed = dest_dir != self.dest_dir;

        // Step 4: make sure the directory exists and accepts files.
        // Routed directories are created here; others may be pre-verified.
        if !self.pre_verified || routed {
            if let Err(e) = fsutil::ensure_writable_dir(&dest_dir) {
                return (MoveOutcome::Failed { reason: e.to_string() }, None);
            }
        }

        // Step 5: real destination directory
        let dest_dir = fsutil::resolve_path(&dest_dir);
        let dest = dest_dir.join(&dest_name);

        // Step 6: an existing destination is fine when it IS the source,
        // fatal when it differs and overwriting is off
        if dest.exists() {
            let same = fs::canonicalize(&dest).is_ok_and(|real| real == source);
            if same {
                tracing::info!("Already in place: {}", dest.display());
                *duplicates = self.scan_duplicates(&dest_dir, &dest);
                return (MoveOutcome::AlreadyInPlace, Some(dest));
            }
            if !self.settings.overwrite_existing {
                return (
                    MoveOutcome::Failed {
                        reason: format!("destination already exists: {}", dest.display()),
                    },
                    None,
                );
            }
        }

        // Step 7: remember the source mtime before anything touches it
        let original_mtime = fs::metadata(&source).and_then(|m| m.modified()).ok();

        // Step 8 / Step 9: rename on the same filesystem, copy across
        let (outcome, actual) = if self.use_rename(&source, &dest_dir) {
            self.rename_into(&source, &dest)
        } else {
            self.copy_into(&source, &dest)
        };
        let Some(landed) = actual else {
            return (outcome, None);
        };
        let was_copy = matches!(outcome, MoveOutcome::Copied);

        // Step 10: modification-time policy; a failure here never reverts
        // the move
        self.apply_mtime_policy(&landed, original_mtime, was_copy, mtime_failure);

        // Step 11: look for other copies of this episode at the destination
        *duplicates = self.scan_duplicates(&dest_dir, &landed);

        // Step 12: tidy now-empty source directories
        if self.settings.remove_empty_source_dirs {
            if let Some(parent) = source.parent() {
                fsutil::prune_empty_dirs_upward(parent, self.destination_root().as_deref());
            }
        }

        (outcome, Some(landed))
    }

    fn routed_dir(&self) -> PathBuf {
        let is_conflict_copy = self.index.is_some_and(|n| n > 1);
        if is_conflict_copy
            && self.settings.route_duplicates_to_subdir
            && self.settings.move_enabled
        {
            if let Some(root) = &self.settings.destination {
                return root.join(&self.settings.duplicates_dir);
            }
        }
        self.dest_dir.clone()
    }

    fn indexed_name(&self) -> String {
        let suffix = self.episode.suffix();
        match self.index {
            Some(n) if n > 1 => format!("{} ({n}){suffix}", self.basename),
            _ => format!("{}{suffix}", self.basename),
        }
    }

    fn destination_root(&self) -> Option<PathBuf> {
        self.settings
            .destination
            .as_deref()
            .map(fsutil::resolve_path)
    }

    fn use_rename(&self, source: &Path, dest_dir: &Path) -> bool {
        if self.force_copy {
            return false;
        }
        fsutil::is_same_filesystem(source, dest_dir).unwrap_or(false)
    }

    fn rename_into(&mut self, source: &Path, dest: &Path) -> (MoveOutcome, Option<PathBuf>) {
        self.observer.set_progress_status("renaming");
        tracing::info!("Renaming {} -> {}", source.display(), dest.display());
        match fsutil::rename_file(source, dest) {
            Ok(actual) if actual == *dest => (MoveOutcome::Renamed, Some(actual)),
            Ok(actual) => {
                tracing::warn!(
                    "Rename of {} landed at {} instead of {}",
                    source.display(),
                    actual.display(),
                    dest.display()
                );
                (
                    MoveOutcome::Misnamed {
                        actual: actual.clone(),
                    },
                    Some(actual),
                )
            }
            Err(e) => (
                MoveOutcome::Failed {
                    reason: format!("rename failed: {e}"),
                },
                None,
            ),
        }
    }

    fn copy_into(&mut self, source: &Path, dest: &Path) -> (MoveOutcome, Option<PathBuf>) {
        // Space preflight keeps a doomed copy from filling the disk
        if let Ok(free) = fsutil::available_space(dest.parent().unwrap_or(dest)) {
            if free < self.size {
                return (
                    MoveOutcome::Failed {
                        reason: format!(
                            "not enough space at destination: need {} bytes, have {free}",
                            self.size
                        ),
                    },
                    None,
                );
            }
        }

        // An overwritten destination goes away before the copy starts
        if dest.exists() {
            if let Err(e) = fs::remove_file(dest) {
                return (
                    MoveOutcome::Failed {
                        reason: format!("cannot replace existing destination: {e}"),
                    },
                    None,
                );
            }
        }

        self.observer.set_progress_status("copying");
        self.observer.initialize_progress(self.size);
        tracing::info!("Copying {} -> {}", source.display(), dest.display());

        let interrupt = Arc::clone(&self.interrupt);
        let observer = &mut self.observer;
        let copied = fsutil::copy_with_progress(source, dest, &interrupt, |bytes| {
            observer.set_progress_value(bytes);
        });

        match copied {
            Ok(_) => {
                // Source goes only after the verified copy
                match fs::remove_file(source) {
                    Ok(()) => (MoveOutcome::Copied, Some(dest.to_path_buf())),
                    Err(e) => {
                        tracing::error!(
                            "Copy verified but source {} could not be removed: {e}",
                            source.display()
                        );
                        (
                            MoveOutcome::Failed {
                                reason: format!("source not removed after copy: {e}"),
                            },
                            Some(dest.to_path_buf()),
                        )
                    }
                }
            }
            Err(e) => {
                self.cleanup_failed_copy(dest);
                (
                    MoveOutcome::Failed {
                        reason: format!("copy failed: {e}"),
                    },
                    None,
                )
            }
        }
    }

    /// Single cleanup path for every failed or interrupted copy: drop the
    /// partial file, then prune directories the move created, stopping at
    /// the destination root.
    fn cleanup_failed_copy(&self, dest: &Path) {
        let _ = fs::remove_file(dest);
        if let Some(parent) = dest.parent() {
            fsutil::prune_empty_dirs_upward(parent, self.destination_root().as_deref());
        }
    }

    fn apply_mtime_policy(
        &self,
        target: &Path,
        original: Option<SystemTime>,
        was_copy: bool,
        mtime_failure: &mut bool,
    ) {
        let stamp = if self.settings.preserve_modification_time {
            // A rename already kept the original mtime
            if was_copy { original } else { None }
        } else {
            Some(SystemTime::now())
        };
        let Some(stamp) = stamp else { return };

        let result = File::options()
            .write(true)
            .open(target)
            .and_then(|f| f.set_modified(stamp));
        if let Err(e) = result {
            tracing::warn!(
                "Could not set modification time on {}: {e}",
                target.display()
            );
            *mtime_failure = true;
        }
    }

    /// Other files in the destination directory that look like the same
    /// episode: same stem with another extension, or a parse that lands on
    /// the same slot for a similar show name.
    fn scan_duplicates(&self, dir: &Path, just_moved: &Path) -> Vec<PathBuf> {
        if !self.settings.scan_for_duplicates {
            return Vec::new();
        }
        let Ok(entries) = fs::read_dir(dir) else {
            return Vec::new();
        };
        let own_stem = just_moved.file_stem().map(std::ffi::OsStr::to_os_string);
        let ours = self.episode.parsed_episode();

        let mut found = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path == *just_moved || !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            if path.file_stem().map(std::ffi::OsStr::to_os_string) == own_stem {
                found.push(path);
                continue;
            }
            let Some(ours) = ours else { continue };
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Ok(candidate) = parser::parse_filename(&stem) {
                let similarity = strsim::normalized_levenshtein(
                    &normalize_show_name(&candidate.show),
                    &normalize_show_name(&ours.show),
                );
                if candidate.placement.same_slot(&ours.placement)
                    && similarity >= DUPLICATE_SIMILARITY
                {
                    found.push(path);
                }
            }
        }
        found.sort();
        found
    }
}
