use crate::naming;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("destination is required when move_enabled is true")]
    MissingDestination,
    #[error("task_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("duplicates_dir must be a bare directory name, got {0:?}")]
    InvalidDuplicatesDir(String),
    #[error("naming pattern {0:?} contains no placeholders")]
    PatternWithoutPlaceholders(String),
}

/// User-facing settings, loaded from a YAML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    /// Library root that episodes are moved into. Optional while only
    /// scanning; required once moves are enabled.
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// When false, files are renamed in place instead of moved into the
    /// destination tree.
    #[serde(default = "default_true")]
    pub move_enabled: bool,

    #[serde(default)]
    pub overwrite_existing: bool,

    #[serde(default = "default_true")]
    pub preserve_modification_time: bool,

    #[serde(default = "default_true")]
    pub remove_empty_source_dirs: bool,

    #[serde(default = "default_true")]
    pub scan_for_duplicates: bool,

    /// Route conflicting episodes into a subdirectory of the destination
    /// instead of suffixing them next to the winner.
    #[serde(default)]
    pub route_duplicates_to_subdir: bool,

    #[serde(default = "default_duplicates_dir")]
    pub duplicates_dir: String,

    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,

    #[serde(default = "default_directory_pattern")]
    pub directory_pattern: String,

    /// Maps parsed show names to the name used in destination paths.
    /// Keys are matched after normalization.
    #[serde(default)]
    pub show_overrides: HashMap<String, String>,

    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    #[serde(default = "default_video_extensions")]
    pub video_extensions: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_duplicates_dir() -> String {
    "#duplicates#".to_string()
}

fn default_naming_pattern() -> String {
    "{show} - S{season:02}E{episode:02}".to_string()
}

fn default_directory_pattern() -> String {
    "{show}/Season {season:02}".to_string()
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_video_extensions() -> Vec<String> {
    ["avi", "mkv", "mov", "mp4", "m4v", "mpg", "mpeg", "wmv", "flv", "webm", "ts"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            destination: None,
            move_enabled: true,
            overwrite_existing: false,
            preserve_modification_time: true,
            remove_empty_source_dirs: true,
            scan_for_duplicates: true,
            route_duplicates_to_subdir: false,
            duplicates_dir: default_duplicates_dir(),
            naming_pattern: default_naming_pattern(),
            directory_pattern: default_directory_pattern(),
            show_overrides: HashMap::new(),
            task_timeout_secs: default_task_timeout_secs(),
            video_extensions: default_video_extensions(),
        }
    }
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_yaml::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.move_enabled && self.destination.is_none() {
            return Err(ConfigError::MissingDestination);
        }
        if self.task_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.duplicates_dir.is_empty()
            || self.duplicates_dir.contains('/')
            || self.duplicates_dir.contains('\\')
        {
            return Err(ConfigError::InvalidDuplicatesDir(self.duplicates_dir.clone()));
        }
        for pattern in [&self.naming_pattern, &self.directory_pattern] {
            if !naming::has_placeholders(pattern) {
                return Err(ConfigError::PatternWithoutPlaceholders(pattern.clone()));
            }
        }
        Ok(())
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    /// Extension-based video check, case-insensitive.
    pub fn is_video(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.video_extensions
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    }
}

/// Default location of the settings file, under the platform config dir.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("tvshelf").join("config.yaml"))
        .unwrap_or_else(|| PathBuf::from("tvshelf.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.yaml");
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.move_enabled);
        assert!(!settings.overwrite_existing);
        assert!(settings.preserve_modification_time);
        assert!(settings.scan_for_duplicates);
        assert!(!settings.route_duplicates_to_subdir);
        assert_eq!(settings.duplicates_dir, "#duplicates#");
        assert_eq!(settings.task_timeout(), Duration::from_secs(120));
        assert!(settings.video_extensions.iter().any(|e| e == "mkv"));
    }

    #[test]
    fn test_default_needs_destination_for_moves() {
        let settings = Settings::default();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingDestination)
        ));
    }

    #[test]
    fn test_minimal_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "destination: /media/tv\n");
        let settings = Settings::from_file(&path).expect("Should load minimal config");
        assert_eq!(settings.destination, Some(PathBuf::from("/media/tv")));
        assert!(settings.move_enabled);
        assert_eq!(settings.naming_pattern, default_naming_pattern());
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"
destination: /media/tv
move_enabled: true
overwrite_existing: true
preserve_modification_time: false
remove_empty_source_dirs: false
scan_for_duplicates: false
route_duplicates_to_subdir: true
duplicates_dir: dupes
naming_pattern: "{show} S{season:02}E{episode:02}"
directory_pattern: "{show}"
task_timeout_secs: 30
video_extensions: [mkv, avi]
show_overrides:
  archer: "Archer (2009)"
"#,
        );
        let settings = Settings::from_file(&path).expect("Should load full config");
        assert!(settings.overwrite_existing);
        assert!(!settings.preserve_modification_time);
        assert!(settings.route_duplicates_to_subdir);
        assert_eq!(settings.duplicates_dir, "dupes");
        assert_eq!(settings.task_timeout(), Duration::from_secs(30));
        assert_eq!(settings.video_extensions, vec!["mkv", "avi"]);
        assert_eq!(
            settings.show_overrides.get("archer").map(String::as_str),
            Some("Archer (2009)")
        );
    }

    #[test]
    fn test_move_disabled_allows_missing_destination() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "move_enabled: false\n");
        let settings = Settings::from_file(&path).expect("Should load rename-only config");
        assert!(!settings.move_enabled);
        assert_eq!(settings.destination, None);
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "destination: /media/tv\ntask_timeout_secs: 0\n");
        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_rejects_nested_duplicates_dir() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "destination: /media/tv\nduplicates_dir: a/b\n");
        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::InvalidDuplicatesDir(_))
        ));
    }

    #[test]
    fn test_rejects_pattern_without_placeholders() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "destination: /media/tv\nnaming_pattern: fixed\n");
        assert!(matches!(
            Settings::from_file(&path),
            Err(ConfigError::PatternWithoutPlaceholders(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        assert!(matches!(
            Settings::from_file(&missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_is_video() {
        let settings = Settings::default();
        assert!(settings.is_video(Path::new("Show.S01E02.mkv")));
        assert!(settings.is_video(Path::new("Show.S01E02.MKV")));
        assert!(!settings.is_video(Path::new("notes.txt")));
        assert!(!settings.is_video(Path::new("Makefile")));
    }
}
