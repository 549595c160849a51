use crate::episode::{EpisodePlacement, ParseFailure, ParseResult, ParsedEpisode};
use crate::patterns;
use std::path::Path;
use tracing::debug;

/// Augmented names shorter than this carry too little signal to parse.
const MIN_FILENAME_LEN: usize = 4;

/// Parse a media file path into a show / season / episode placement.
///
/// When the filename itself opens with an episode token (`S01E02.mkv`,
/// `1x02 - Pilot.mkv`) the show name is recovered from the nearest
/// ancestor directory that is not season structure and not the duplicates
/// subdirectory named by `duplicates_dir`.
pub fn parse_path(path: &Path, duplicates_dir: &str) -> ParseResult {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut working = stem;
    if patterns::starts_with_episode_token(&working) {
        if let Some(prefix) = show_name_from_ancestors(path, duplicates_dir) {
            working = format!("{prefix} {working}");
        }
    }

    let result = parse_filename(&working);
    if let Ok(parsed) = &result {
        debug!(
            "Parsed {} as '{}' {}",
            path.display(),
            parsed.show,
            parsed.placement
        );
    }
    result
}

/// Walk up the directory chain looking for a component that names the
/// show. Season folders and the duplicates folder are structural and get
/// skipped; a trailing `Season NN` suffix on the chosen component is
/// dropped. Returns None at the filesystem root.
fn show_name_from_ancestors(path: &Path, duplicates_dir: &str) -> Option<String> {
    for ancestor in path.ancestors().skip(1) {
        let Some(name) = ancestor.file_name() else {
            break;
        };
        let name = name.to_string_lossy();
        if patterns::is_season_directory(&name) || name.eq_ignore_ascii_case(duplicates_dir) {
            continue;
        }
        let contribution = patterns::strip_season_suffix(&name);
        if !contribution.is_empty() {
            return Some(contribution);
        }
    }
    None
}

/// Parse a filename stem (without extension, possibly already augmented
/// with a directory-derived show prefix).
pub fn parse_filename(name: &str) -> ParseResult {
    if name.chars().count() < MIN_FILENAME_LEN {
        return Err(ParseFailure::FilenameTooShort);
    }

    // Junk goes first: a name that is nothing but a release tag has no
    // alphanumeric content worth matching.
    let cleaned = patterns::strip_release_junk(name);
    if !cleaned.chars().any(|c| c.is_ascii_alphanumeric()) {
        return Err(ParseFailure::NoAlphanumeric);
    }

    let Some(hit) = patterns::match_episode(&cleaned) else {
        return Err(diagnose(&cleaned));
    };

    let show = clean_show_name(&hit.show);
    if show.is_empty() {
        return Err(ParseFailure::NoShowName);
    }

    let placement = match hit.end_episode {
        Some(end) => EpisodePlacement::span(hit.season, hit.episode, end),
        None => EpisodePlacement::new(hit.season, hit.episode),
    };

    Ok(ParsedEpisode {
        show,
        placement,
        resolution: hit.resolution,
    })
}

/// Extract only the season/episode placement from a filename, ignoring
/// whatever show prefix it may or may not carry. Used when comparing
/// against files already sitting in the destination.
pub fn parse_season_episode(name: &str) -> Option<EpisodePlacement> {
    let stem = Path::new(name).file_stem()?.to_string_lossy();
    patterns::match_episode(&stem).map(|hit| match hit.end_episode {
        Some(end) => EpisodePlacement::span(hit.season, hit.episode, end),
        None => EpisodePlacement::new(hit.season, hit.episode),
    })
}

/// A raw show capture is scene-style punctuation soup. Fold separators
/// into spaces and drop the trailing separator run left over from the
/// boundary with the episode numbering.
fn clean_show_name(raw: &str) -> String {
    let spaced: String = raw
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();
    let collapsed = spaced.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches([' ', '-']).to_string()
}

/// The cascade found nothing. Distinguish "numbering is there but the show
/// could not be isolated" from "no episode numbering at all".
fn diagnose(name: &str) -> ParseFailure {
    if patterns::has_episode_marker(name) {
        ParseFailure::NoShowName
    } else {
        ParseFailure::NoSeasonEpisode
    }
}
