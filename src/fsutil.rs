use crate::config::Settings;
use crate::error::{AppError, Result};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use walkdir::WalkDir;
use xxhash_rust::xxh3::Xxh3;

/// Read/write chunk size for copies and hashing.
pub const COPY_BUF_SIZE: usize = 1024 * 1024;

/// Progress callbacks fire at most once per this many copied bytes.
const PROGRESS_STEP: u64 = 4 * 1024 * 1024;

#[cfg(target_os = "linux")]
fn advise_sequential(file: &File) {
    use std::os::unix::io::AsRawFd;
    // Hint the kernel we stream this file front to back.
    let _ = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_SEQUENTIAL) };
}

#[cfg(not(target_os = "linux"))]
fn advise_sequential(_file: &File) {}

#[cfg(target_os = "linux")]
fn advise_done(file: &File) {
    use std::os::unix::io::AsRawFd;
    // Drop the pages we just read so a bulk move does not evict the cache.
    let _ = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
}

#[cfg(not(target_os = "linux"))]
fn advise_done(_file: &File) {}

/// Whether two existing paths live on the same filesystem, and a plain
/// rename can move between them.
#[cfg(unix)]
pub fn is_same_filesystem(a: &Path, b: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    Ok(fs::metadata(a)?.dev() == fs::metadata(b)?.dev())
}

#[cfg(not(unix))]
pub fn is_same_filesystem(a: &Path, b: &Path) -> io::Result<bool> {
    // No device ids here; fall back to comparing the path roots.
    Ok(a.components().next() == b.components().next())
}

/// Best-effort canonical form of a path, usable before the file exists.
pub fn resolve_path(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// Rename and report where the file actually landed, which on
/// case-folding or normalizing filesystems may differ from the requested
/// destination. Once the rename itself succeeded the move stands: a
/// failing real-path lookup (some network shares) falls back to the
/// requested path instead of turning a completed move into an error.
pub fn rename_file(from: &Path, to: &Path) -> io::Result<PathBuf> {
    fs::rename(from, to)?;
    Ok(resolve_path(to))
}

/// Create the directory if needed and prove it accepts new files.
pub fn ensure_writable_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| AppError::DestinationUnusable {
        path: dir.to_path_buf(),
        reason: format!("cannot create: {e}"),
    })?;
    let probe = dir.join(".tvshelf-probe");
    match File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            Ok(())
        }
        Err(e) => Err(AppError::DestinationUnusable {
            path: dir.to_path_buf(),
            reason: format!("not writable: {e}"),
        }),
    }
}

pub fn available_space(dir: &Path) -> io::Result<u64> {
    fs2::available_space(dir)
}

/// Copy `src` to `dst` in chunks, hashing the stream, then re-read the
/// destination and compare digests. Returns the byte count on success.
///
/// The interrupt flag is checked between chunks; an interrupted copy
/// returns `ErrorKind::Interrupted` and leaves the partial destination
/// for the caller to clean up.
pub fn copy_with_progress(
    src: &Path,
    dst: &Path,
    interrupt: &AtomicBool,
    mut progress: impl FnMut(u64),
) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    advise_sequential(&reader);
    let mut writer = File::create(dst)?;

    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut copied: u64 = 0;
    let mut last_reported: u64 = 0;

    loop {
        if interrupt.load(Ordering::Relaxed) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "move interrupted"));
        }
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        copied += n as u64;
        if copied - last_reported >= PROGRESS_STEP {
            progress(copied);
            last_reported = copied;
        }
    }

    writer.sync_all()?;
    advise_done(&reader);
    drop(reader);
    drop(writer);

    let expected = hasher.digest();
    let actual = hash_file(dst)?;
    if expected != actual {
        return Err(io::Error::other(format!(
            "Checksum mismatch after copying {} to {}",
            src.display(),
            dst.display()
        )));
    }

    progress(copied);
    Ok(copied)
}

/// Streaming xxh3 digest of a whole file.
pub fn hash_file(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    advise_sequential(&file);
    let mut hasher = Xxh3::new();
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    advise_done(&file);
    Ok(hasher.digest())
}

/// Remove `start` and then each parent while they are empty. Stops at the
/// first non-empty directory, at any removal error, and never removes
/// `stop` itself.
pub fn prune_empty_dirs_upward(start: &Path, stop: Option<&Path>) {
    let mut current = start.to_path_buf();
    loop {
        if stop.is_some_and(|s| s == current) {
            break;
        }
        match fs::remove_dir(&current) {
            Ok(()) => debug!("Removed empty directory {}", current.display()),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => break,
            Err(e) => {
                debug!("Stopped pruning at {}: {}", current.display(), e);
                break;
            }
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent.to_path_buf(),
            _ => break,
        }
    }
}

/// Recursively list video files under `root`, sorted for stable output.
/// Unreadable entries are logged and skipped.
pub fn list_video_files(root: &Path, settings: &Settings) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if settings.is_video(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry: {e}"),
        }
    }
    files.sort();
    files
}
