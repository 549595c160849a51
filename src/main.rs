use clap::Parser;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;
use tvshelf::{
    Cli, Commands, FileEpisode, FileMover, LogMoveObserver, LogProgressUpdater, MoveRunner,
    NamingEngine, Settings, TaskOutcome, fsutil, parser,
};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan {
            paths,
            config,
            json,
        } => run_scan(&paths, &config, json),
        Commands::Move {
            paths,
            config,
            dry_run,
        } => run_move(&paths, &config, dry_run),
    };

    if let Err(e) = result {
        tracing::error!("Error: {e:#}");
        process::exit(1);
    }
}

/// Scan does not need a config file; moving does, since only the file can
/// say where the library lives.
fn load_settings(path: &Path, required: bool) -> anyhow::Result<Settings> {
    if path.exists() {
        tracing::info!("Loading configuration from: {}", path.display());
        Ok(Settings::from_file(path)?)
    } else if required {
        anyhow::bail!(
            "configuration file {} not found; moves need a configured destination",
            path.display()
        )
    } else {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        Ok(Settings::default())
    }
}

/// Expand the argument list: directories are walked for video files, plain
/// files pass through, anything missing is reported and skipped.
fn collect_files(paths: &[PathBuf], settings: &Settings) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(fsutil::list_video_files(path, settings));
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            tracing::warn!("Skipping missing path: {}", path.display());
        }
    }
    files
}

fn run_scan(paths: &[PathBuf], config_path: &Path, json: bool) -> anyhow::Result<()> {
    let settings = load_settings(config_path, false)?;
    let files = collect_files(paths, &settings);
    if files.is_empty() {
        anyhow::bail!("no video files found under the given paths");
    }

    let mut entries = Vec::new();
    let mut recognized = 0usize;
    for file in &files {
        match parser::parse_path(file, &settings.duplicates_dir) {
            Ok(parsed) => {
                recognized += 1;
                if json {
                    entries.push(serde_json::json!({
                        "path": file,
                        "show": parsed.show,
                        "season": parsed.placement.season,
                        "episode": parsed.placement.episode,
                        "end_episode": parsed.placement.end_episode,
                        "resolution": parsed.resolution,
                    }));
                } else {
                    let resolution = parsed
                        .resolution
                        .as_deref()
                        .map(|r| format!(" [{r}]"))
                        .unwrap_or_default();
                    println!(
                        "{:<60} {} {}{}",
                        file.display(),
                        parsed.show,
                        parsed.placement,
                        resolution
                    );
                }
            }
            Err(failure) => {
                if json {
                    entries.push(serde_json::json!({
                        "path": file,
                        "error": failure.to_string(),
                    }));
                } else {
                    println!("{:<60} ! {failure}", file.display());
                }
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        println!("\n{recognized} of {} files recognized", files.len());
    }
    Ok(())
}

fn run_move(paths: &[PathBuf], config_path: &Path, dry_run: bool) -> anyhow::Result<()> {
    let settings = Arc::new(load_settings(config_path, true)?);
    let files = collect_files(paths, &settings);
    if files.is_empty() {
        anyhow::bail!("no video files found under the given paths");
    }

    let engine = NamingEngine::new(
        &settings.naming_pattern,
        &settings.directory_pattern,
        &settings.show_overrides,
    );

    let mut movers = Vec::new();
    let mut unparsed = 0usize;
    for file in files {
        let parse = parser::parse_path(&file, &settings.duplicates_dir);
        let episode = FileEpisode::parsed(file, parse);
        let Some(parsed) = episode.parsed_episode() else {
            unparsed += 1;
            if let Some(Err(failure)) = episode.parse_result() {
                println!("skipping {}: {failure}", episode.path().display());
            }
            continue;
        };

        let dest_dir = if settings.move_enabled {
            // validate() guarantees a destination when moving is on
            let Some(root) = settings.destination.as_deref() else {
                anyhow::bail!("move_enabled requires a destination directory");
            };
            root.join(engine.relative_dir(parsed))
        } else {
            // Rename in place: the file keeps its directory, only the
            // basename changes.
            episode
                .path()
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default()
        };
        let basename = engine.basename(parsed);
        movers.push(
            FileMover::new(episode, dest_dir, basename, Arc::clone(&settings))
                .with_observer(Box::new(LogMoveObserver)),
        );
    }

    if movers.is_empty() {
        anyhow::bail!("none of the {unparsed} files could be parsed");
    }

    if dry_run {
        let runner = MoveRunner::new(movers, settings);
        println!("Planned moves ({}):", runner.len());
        for (source, dest) in runner.planned_moves() {
            println!("  {} -> {}", source.display(), dest.display());
        }
        return Ok(());
    }

    let runner = MoveRunner::new(movers, settings);
    let shutdown = runner.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received interrupt signal, shutting down gracefully...");
        shutdown.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to set Ctrl-C handler: {e}");
    }

    let report = runner.run(&LogProgressUpdater);

    for outcome in &report.outcomes {
        match outcome {
            TaskOutcome::Completed(result) => {
                let episode = &result.episode;
                match episode.moved_to() {
                    Some(dest) => println!(
                        "{}: {} -> {}",
                        episode.status(),
                        episode.path().display(),
                        dest.display()
                    ),
                    None => println!("{}: {}", episode.status(), episode.path().display()),
                }
                if result.mtime_failure {
                    println!("  (modification time could not be set)");
                }
            }
            TaskOutcome::Cancelled(episode) => {
                println!("cancelled: {}", episode.path().display());
            }
            TaskOutcome::Unfinished { source } => {
                println!("timed out: {}", source.display());
            }
        }
    }
    println!(
        "\n{} succeeded, {} failed, {} skipped as unparsable",
        report.succeeded(),
        report.failed(),
        unparsed
    );

    if !report.duplicates.is_empty() {
        println!("\nPossible duplicates left in the library (not touched):");
        for dup in &report.duplicates {
            println!("  {}", dup.display());
        }
    }

    if report.failed() > 0 {
        process::exit(2);
    }
    Ok(())
}
