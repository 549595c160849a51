use crate::config::default_config_path;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tvshelf")]
#[command(version)]
#[command(about = "Parse episode filenames and sort them into a TV library", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse filenames and show what was recognized, without moving anything
    Scan {
        /// Files or directories to scan
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Path to configuration file
        #[arg(short, long, value_name = "FILE", default_value_os_t = default_config_path())]
        config: PathBuf,

        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Parse filenames and move them into the configured library
    Move {
        /// Files or directories to move
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,

        /// Path to configuration file
        #[arg(short, long, value_name = "FILE", default_value_os_t = default_config_path())]
        config: PathBuf,

        /// Dry-run mode: show planned destinations without executing moves
        #[arg(short = 'n', long)]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_scan() {
        let cli = Cli::try_parse_from(["tvshelf", "scan", "/downloads", "--json"]).unwrap();
        match cli.command {
            Commands::Scan { paths, json, .. } => {
                assert_eq!(paths, vec![PathBuf::from("/downloads")]);
                assert!(json);
            }
            Commands::Move { .. } => panic!("Expected scan subcommand"),
        }
    }

    #[test]
    fn test_cli_parses_move_with_dry_run() {
        let cli = Cli::try_parse_from([
            "tvshelf",
            "move",
            "-n",
            "--config",
            "/tmp/conf.yaml",
            "a.mkv",
            "b.mkv",
        ])
        .unwrap();
        match cli.command {
            Commands::Move {
                paths,
                config,
                dry_run,
            } => {
                assert_eq!(paths.len(), 2);
                assert_eq!(config, PathBuf::from("/tmp/conf.yaml"));
                assert!(dry_run);
            }
            Commands::Scan { .. } => panic!("Expected move subcommand"),
        }
    }

    #[test]
    fn test_cli_requires_paths() {
        assert!(Cli::try_parse_from(["tvshelf", "scan"]).is_err());
        assert!(Cli::try_parse_from(["tvshelf", "move"]).is_err());
    }
}
