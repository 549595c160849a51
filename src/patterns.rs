use lazy_regex::regex;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Trailing resolution marker: `720p`, `1080p`, `2160p`, `4k`.
const RESOLUTION: &str = r"\d{3,4}p|\dk";

/// Episode numbering templates, most specific first. Group roles are
/// positional: 1 = show, 2 = season, 3 = episode (or span start),
/// 4 = span end, and the resolution capture is appended by the doubling.
/// First matching form wins; order encodes precedence, nothing rescores.
const TEMPLATES: [&str; 11] = [
    // 1: explicit multi-episode list, S01E04E05
    r"(?i)(.*?)s(\d{1,2})e(\d{1,3})e(\d{1,3})",
    // 2: explicit multi-episode range, S02E04-E06
    r"(?i)(.*?)s(\d{1,2})e(\d{1,3})-e?(\d{1,3})",
    // 3: canonical SxxExx
    r"(?i)(.*?)s(\d{1,2})[._ -]?e(\d{1,3})",
    // 4: verbose Season XX Episode XX
    r"(?i)(.*?)season[._ -]*(\d{1,2})[._ -]*episode[._ -]*(\d{1,3})",
    // 5: broadcaster Series_N_-_M downloads
    r"(?i)(.*?)[._ -]series[._ -]+(\d{1,2})[._ -]+-[._ -]+(?:episode[._ -]+)?(\d{1,3})",
    // 6: loose sXX <junk> eXX
    r"(?i)(.*?)s(\d{1,2})\D*?e(\d{1,3})",
    // 7: SSxEE
    r"(?i)(.*?)(\d{1,2})x(\d{1,3})",
    // 8: year in the show title, season/episode are the next digit runs
    r"(?i)(.*?[._ -](?:19|20)\d\d[._ -].*?)(\d{1,2})\D+(\d{1,3})",
    // 9: exactly four digits, split SXXYY
    r"(?i)(.*?\D)(\d\d)(\d\d)(?:\D|$)",
    // 10: any two digit runs separated by non-digits
    r"(?i)(.*?\D)(\d{1,2})\D+(\d{1,3})",
    // 11: last resort, tolerates an empty or digit-adjacent show prefix
    r"(?i)(.*?)(\d{1,2})\D+(\d{1,3})",
];

/// One template compiled in both forms. The resolution form is tried first
/// so a trailing `720p` is captured instead of being swallowed as title
/// junk by the bare form.
pub struct EpisodePattern {
    with_resolution: Regex,
    bare: Regex,
}

impl EpisodePattern {
    #[allow(clippy::expect_used)] // templates are compile-time constants
    fn compile(template: &str) -> Self {
        let with_resolution = format!(r"{template}\D*?({RESOLUTION})");
        Self {
            with_resolution: Regex::new(&with_resolution)
                .expect("episode pattern with resolution must compile"),
            bare: Regex::new(template).expect("episode pattern must compile"),
        }
    }
}

static TABLE: LazyLock<Vec<EpisodePattern>> =
    LazyLock::new(|| TEMPLATES.iter().map(|t| EpisodePattern::compile(t)).collect());

/// Raw pattern-table hit, before show-name cleaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub show: String,
    pub season: u32,
    pub episode: u32,
    pub end_episode: Option<u32>,
    pub resolution: Option<String>,
}

/// Run the cascade against an augmented filename stem. Returns the first
/// matching template's interpretation, or None when nothing matched.
pub fn match_episode(name: &str) -> Option<PatternMatch> {
    for pattern in TABLE.iter() {
        for re in [&pattern.with_resolution, &pattern.bare] {
            if let Some(caps) = re.captures(name) {
                if let Some(hit) = interpret(&caps) {
                    return Some(hit);
                }
            }
        }
    }
    None
}

/// Read the positional groups out of a match. A match carrying a 4th group
/// is tentatively a multi-episode span; it is only accepted as one when
/// both episode captures parse and `end >= start`, otherwise the 4th group
/// is demoted to the resolution tag of a single-episode match.
fn interpret(caps: &Captures<'_>) -> Option<PatternMatch> {
    let show = caps.get(1).map_or(String::new(), |m| m.as_str().to_string());
    let season: u32 = caps.get(2)?.as_str().parse().ok()?;
    let episode: u32 = caps.get(3)?.as_str().parse().ok()?;

    let mut end_episode = None;
    let mut resolution = caps.get(5).map(|m| m.as_str().to_string());

    if let Some(fourth) = caps.get(4) {
        match fourth.as_str().parse::<u32>() {
            Ok(end) if end >= episode => end_episode = Some(end),
            _ => {
                if resolution.is_none() {
                    resolution = Some(fourth.as_str().to_string());
                }
            }
        }
    }

    Some(PatternMatch {
        show,
        season,
        episode,
        end_episode,
        resolution,
    })
}

/// Does the filename open with a season/episode token (`S01E02`, `1x02`,
/// `102`, ...)? Such names carry no show identity of their own and need
/// the parent directory folded in.
pub fn starts_with_episode_token(name: &str) -> bool {
    regex!(r"(?i)^(s\d\de\d\d|s?\d\d?[x.]?\d\d\d?)").is_match(name)
}

/// Directory names that carry season structure rather than a show name.
pub fn is_season_directory(name: &str) -> bool {
    regex!(r"(?i)^season").is_match(name) || regex!(r"(?i)^s0\d$").is_match(name)
}

/// Strip a trailing `Season NN`-style suffix from a directory name, so
/// `"Show Name Season02"` contributes just `"Show Name"`.
pub fn strip_season_suffix(name: &str) -> String {
    regex!(r"(?i)[._ -]*season[._ -]*\d+$")
        .replace(name, "")
        .trim()
        .to_string()
}

/// Splice out the last occurrence of each known scene-release junk token.
pub fn strip_release_junk(name: &str) -> String {
    let mut out = name.to_string();
    for re in [regex!(r"(?i)hdtv"), regex!(r"(?i)dvdrip")] {
        if let Some(m) = re.find_iter(&out).last() {
            out.replace_range(m.range(), "");
        }
    }
    out
}

/// Permissive probe used only for failure diagnosis: is there anything in
/// the name that even loosely resembles episode numbering?
pub fn has_episode_marker(name: &str) -> bool {
    regex!(r"(?i)s\d+e\d+|\d+x\d+|\d\d").is_match(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_compiles() {
        assert_eq!(TABLE.len(), TEMPLATES.len());
    }

    #[test]
    fn test_canonical_with_resolution() {
        let hit = match_episode("Show.Name.S01E02.720p").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 2);
        assert_eq!(hit.resolution.as_deref(), Some("720p"));
        assert_eq!(hit.show, "Show.Name.");
    }

    #[test]
    fn test_resolution_does_not_change_placement() {
        let with_res = match_episode("Show.S03E07.1080p").unwrap();
        let without = match_episode("Show.S03E07").unwrap();
        assert_eq!((with_res.season, with_res.episode), (without.season, without.episode));
        assert_eq!(with_res.resolution.as_deref(), Some("1080p"));
        assert_eq!(without.resolution, None);
    }

    #[test]
    fn test_four_k_resolution() {
        let hit = match_episode("Show.S01E02.4k").unwrap();
        assert_eq!(hit.resolution.as_deref(), Some("4k"));
    }

    #[test]
    fn test_multi_episode_list() {
        let hit = match_episode("Show.S01E04E05").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 4);
        assert_eq!(hit.end_episode, Some(5));
    }

    #[test]
    fn test_multi_episode_range() {
        let hit = match_episode("Show.S02E04-E06").unwrap();
        assert_eq!(hit.season, 2);
        assert_eq!(hit.episode, 4);
        assert_eq!(hit.end_episode, Some(6));
    }

    #[test]
    fn test_multi_episode_range_with_resolution() {
        let hit = match_episode("Show.S02E04-E06.1080p").unwrap();
        assert_eq!(hit.end_episode, Some(6));
        assert_eq!(hit.resolution.as_deref(), Some("1080p"));
    }

    #[test]
    fn test_descending_span_demoted_to_resolution() {
        // End below start cannot be a span, so the 4th group is read as a
        // resolution tag for a single episode.
        let hit = match_episode("Show.S01E04E03").unwrap();
        assert_eq!(hit.episode, 4);
        assert_eq!(hit.end_episode, None);
        assert_eq!(hit.resolution.as_deref(), Some("03"));
    }

    #[test]
    fn test_verbose_season_episode() {
        let hit = match_episode("Show.Season.02.Episode.13").unwrap();
        assert_eq!(hit.season, 2);
        assert_eq!(hit.episode, 13);
    }

    #[test]
    fn test_broadcaster_series_form() {
        let hit = match_episode("Show_Series_7_-_4").unwrap();
        assert_eq!(hit.season, 7);
        assert_eq!(hit.episode, 4);

        let verbose = match_episode("Show_Series_7_-_Episode_4").unwrap();
        assert_eq!(verbose.season, 7);
        assert_eq!(verbose.episode, 4);
    }

    #[test]
    fn test_loose_sxx_junk_exx() {
        let hit = match_episode("Show.S01.extra.E05").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 5);
    }

    #[test]
    fn test_ssxee() {
        let hit = match_episode("Show Name 1x02").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 2);
        assert_eq!(hit.show, "Show Name ");
    }

    #[test]
    fn test_year_in_title_then_loose_numbering() {
        let hit = match_episode("Show.2020.1.02").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 2);
        assert!(hit.show.contains("2020"));
    }

    #[test]
    fn test_exactly_four_digits() {
        let hit = match_episode("Show.0102").unwrap();
        assert_eq!(hit.season, 1);
        assert_eq!(hit.episode, 2);
    }

    #[test]
    fn test_fallback_two_digit_runs() {
        let hit = match_episode("Show 3 of 6").unwrap();
        assert_eq!(hit.season, 3);
        assert_eq!(hit.episode, 6);
    }

    #[test]
    fn test_single_digit_season_and_episode() {
        // No pattern demands more than one digit per run.
        let canonical = match_episode("Show.S1E5").unwrap();
        assert_eq!((canonical.season, canonical.episode), (1, 5));

        let ssxee = match_episode("Show 1x2").unwrap();
        assert_eq!((ssxee.season, ssxee.episode), (1, 2));

        let span = match_episode("Show.S1E4E5").unwrap();
        assert_eq!((span.season, span.episode), (1, 4));
        assert_eq!(span.end_episode, Some(5));
    }

    #[test]
    fn test_precedence_canonical_beats_fallback() {
        // "7.10" would satisfy the fallback, but S02E05 must win on order.
        let hit = match_episode("Show.7.10.S02E05").unwrap();
        assert_eq!((hit.season, hit.episode), (2, 5));
    }

    #[test]
    fn test_bare_token_matches_with_empty_show() {
        let hit = match_episode("s01e02").unwrap();
        assert_eq!(hit.show, "");
        assert_eq!((hit.season, hit.episode), (1, 2));
    }

    #[test]
    fn test_no_match_without_numbering() {
        assert!(match_episode("just a film").is_none());
    }

    #[test]
    fn test_starts_with_episode_token() {
        assert!(starts_with_episode_token("S01E02.mkv"));
        assert!(starts_with_episode_token("1x02 - Pilot.mkv"));
        assert!(starts_with_episode_token("102.mkv"));
        assert!(starts_with_episode_token("0102.mkv"));
        assert!(!starts_with_episode_token("Show.S01E02.mkv"));
        assert!(!starts_with_episode_token("24.S01E02.mkv"));
        assert!(!starts_with_episode_token("Pilot.mkv"));
    }

    #[test]
    fn test_is_season_directory() {
        assert!(is_season_directory("Season 01"));
        assert!(is_season_directory("season2"));
        assert!(is_season_directory("S01"));
        assert!(!is_season_directory("Show Name"));
        assert!(!is_season_directory("S01E02"));
    }

    #[test]
    fn test_strip_season_suffix() {
        assert_eq!(strip_season_suffix("Show Name Season02"), "Show Name");
        assert_eq!(strip_season_suffix("Show Name - Season 2"), "Show Name");
        assert_eq!(strip_season_suffix("Show Name"), "Show Name");
    }

    #[test]
    fn test_strip_release_junk_last_occurrence_only() {
        assert_eq!(strip_release_junk("Show.HDTV.S01E02.hdtv"), "Show.HDTV.S01E02.");
        assert_eq!(strip_release_junk("Show.S01E02.DVDRip"), "Show.S01E02.");
        assert_eq!(strip_release_junk("Show.S01E02"), "Show.S01E02");
    }

    #[test]
    fn test_has_episode_marker() {
        assert!(has_episode_marker("S1E5"));
        assert!(has_episode_marker("3x11"));
        assert!(has_episode_marker("something 42"));
        assert!(!has_episode_marker("one 7 two"));
    }
}
