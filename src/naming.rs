use crate::episode::{normalize_show_name, EpisodePlacement, ParsedEpisode};
use lazy_regex::regex;
use regex::Captures;
use std::collections::HashMap;
use std::path::PathBuf;

/// Renders destination names from configurable patterns.
///
/// Patterns use `{placeholder}` or `{placeholder:02}` substitutions, where
/// the suffix is a zero-pad width. Supported placeholders: `show`,
/// `season`, `episode`, `resolution`.
pub struct NamingEngine {
    file_pattern: String,
    directory_pattern: String,
    overrides: HashMap<String, String>,
}

impl NamingEngine {
    /// Override keys are matched against parsed show names after
    /// normalization, so `"Show Name"` and `"show.name (2021)"` select the
    /// same entry.
    pub fn new(
        file_pattern: &str,
        directory_pattern: &str,
        overrides: &HashMap<String, String>,
    ) -> Self {
        let overrides = overrides
            .iter()
            .map(|(k, v)| (normalize_show_name(k), v.clone()))
            .collect();
        Self {
            file_pattern: file_pattern.to_string(),
            directory_pattern: directory_pattern.to_string(),
            overrides,
        }
    }

    /// The show name to render: a configured override when one matches,
    /// otherwise the name recovered from the filename.
    pub fn display_show(&self, episode: &ParsedEpisode) -> String {
        self.overrides
            .get(&normalize_show_name(&episode.show))
            .cloned()
            .unwrap_or_else(|| episode.show.clone())
    }

    /// Destination filename stem (no extension).
    pub fn basename(&self, episode: &ParsedEpisode) -> String {
        sanitize_segment(&self.fill(&self.file_pattern, episode))
    }

    /// Destination directory, relative to the library root. The pattern is
    /// split on `/` and each component is sanitized on its own.
    pub fn relative_dir(&self, episode: &ParsedEpisode) -> PathBuf {
        self.directory_pattern
            .split('/')
            .map(|segment| sanitize_segment(&self.fill(segment, episode)))
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    fn fill(&self, pattern: &str, episode: &ParsedEpisode) -> String {
        regex!(r"\{(\w+)(?::(\d+))?\}")
            .replace_all(pattern, |caps: &Captures<'_>| {
                let width = caps
                    .get(2)
                    .and_then(|m| m.as_str().parse::<usize>().ok())
                    .unwrap_or(0);
                match &caps[1] {
                    "show" => self.display_show(episode),
                    "season" => pad(episode.placement.season, width),
                    "episode" => episode_token(&episode.placement, width),
                    "resolution" => episode.resolution.clone().unwrap_or_default(),
                    // Unknown placeholders pass through untouched.
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

/// Does the pattern contain at least one substitution?
pub fn has_placeholders(pattern: &str) -> bool {
    regex!(r"\{(\w+)(?::(\d+))?\}").is_match(pattern)
}

fn pad(value: u32, width: usize) -> String {
    if width == 0 {
        value.to_string()
    } else {
        format!("{value:0width$}")
    }
}

/// A span renders both endpoints, `04-06`, so multi-episode files keep
/// their full range in the destination name.
fn episode_token(placement: &EpisodePlacement, width: usize) -> String {
    match placement.end_episode {
        Some(end) => format!("{}-{}", pad(placement.episode, width), pad(end, width)),
        None => pad(placement.episode, width),
    }
}

/// Strip characters that are unsafe in filenames on common filesystems.
fn sanitize_segment(segment: &str) -> String {
    regex!(r#"[<>:"/\\|?*\x00-\x1F]"#)
        .replace_all(segment, "_")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(show: &str, placement: EpisodePlacement, resolution: Option<&str>) -> ParsedEpisode {
        ParsedEpisode {
            show: show.to_string(),
            placement,
            resolution: resolution.map(String::from),
        }
    }

    fn engine(file_pattern: &str, dir_pattern: &str) -> NamingEngine {
        NamingEngine::new(file_pattern, dir_pattern, &HashMap::new())
    }

    #[test]
    fn test_default_file_pattern() {
        let e = engine("{show} - S{season:02}E{episode:02}", "{show}/Season {season:02}");
        let ep = episode("Show Name", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&ep), "Show Name - S01E02");
    }

    #[test]
    fn test_span_keeps_range() {
        let e = engine("{show} - S{season:02}E{episode:02}", "{show}");
        let ep = episode("Show Name", EpisodePlacement::span(1, 4, 6), None);
        assert_eq!(e.basename(&ep), "Show Name - S01E04-06");
    }

    #[test]
    fn test_resolution_placeholder() {
        let e = engine("{show} S{season:02}E{episode:02} [{resolution}]", "{show}");
        let with = episode("Show", EpisodePlacement::new(1, 2), Some("720p"));
        assert_eq!(e.basename(&with), "Show S01E02 [720p]");
        let without = episode("Show", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&without), "Show S01E02 []");
    }

    #[test]
    fn test_padding_widths() {
        let e = engine("{season} {season:03} {episode:02}", "{show}");
        let ep = episode("Show", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&ep), "1 001 02");
    }

    #[test]
    fn test_unsafe_characters_replaced() {
        let e = engine("{show} - S{season:02}E{episode:02}", "{show}/Season {season:02}");
        let ep = episode("Show: The Sequel", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&ep), "Show_ The Sequel - S01E02");
        assert_eq!(
            e.relative_dir(&ep),
            PathBuf::from("Show_ The Sequel/Season 01")
        );
    }

    #[test]
    fn test_relative_dir_components() {
        let e = engine("{show}", "{show}/Season {season:02}");
        let ep = episode("Show Name", EpisodePlacement::new(3, 11), None);
        assert_eq!(e.relative_dir(&ep), PathBuf::from("Show Name/Season 03"));
    }

    #[test]
    fn test_show_override_by_normalized_name() {
        let mut overrides = HashMap::new();
        overrides.insert("show name (2021)".to_string(), "Archer (2009)".to_string());
        let e = NamingEngine::new("{show}", "{show}", &overrides);
        let ep = episode("Show Name", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&ep), "Archer (2009)");
    }

    #[test]
    fn test_unknown_placeholder_passes_through() {
        let e = engine("{show} {mystery}", "{show}");
        let ep = episode("Show", EpisodePlacement::new(1, 2), None);
        assert_eq!(e.basename(&ep), "Show {mystery}");
    }

    #[test]
    fn test_has_placeholders() {
        assert!(has_placeholders("{show} - S{season:02}E{episode:02}"));
        assert!(has_placeholders("{episode}"));
        assert!(!has_placeholders("static name"));
    }
}
