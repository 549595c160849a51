use lazy_regex::{Regex, regex};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

/// Season/episode coordinates extracted from a filename.
///
/// `episode` is always the lowest episode of the file; `end_episode` is set
/// only for multi-episode files (`S01E04E05`, `S02E04-E06`) and is used for
/// display, never for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodePlacement {
    pub season: u32,
    pub episode: u32,
    pub end_episode: Option<u32>,
}

impl EpisodePlacement {
    pub const fn new(season: u32, episode: u32) -> Self {
        Self {
            season,
            episode,
            end_episode: None,
        }
    }

    /// A multi-episode span. Callers must ensure `end >= start`.
    pub const fn span(season: u32, start: u32, end: u32) -> Self {
        Self {
            season,
            episode: start,
            end_episode: Some(end),
        }
    }

    pub const fn is_span(&self) -> bool {
        self.end_episode.is_some()
    }

    /// True when two placements name the same episode slot, ignoring spans.
    pub fn same_slot(&self, other: &Self) -> bool {
        self.season == other.season && self.episode == other.episode
    }
}

impl fmt::Display for EpisodePlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end_episode {
            Some(end) => write!(
                f,
                "S{:02}E{:02}-{:02}",
                self.season, self.episode, end
            ),
            None => write!(f, "S{:02}E{:02}", self.season, self.episode),
        }
    }
}

/// Successful parse: the raw show name as it appeared in the filename,
/// the placement, and the resolution tag when one trailed the numbering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEpisode {
    pub show: String,
    pub placement: EpisodePlacement,
    pub resolution: Option<String>,
}

/// Why a filename failed to parse. Each carries a user-facing message;
/// parsing never fails out of band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    FilenameTooShort,
    NoAlphanumeric,
    NoShowName,
    NoSeasonEpisode,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::FilenameTooShort => "filename is too short to name an episode",
            Self::NoAlphanumeric => "filename contains no alphanumeric characters",
            Self::NoShowName => "episode numbering found, but no show name could be isolated",
            Self::NoSeasonEpisode => "no season/episode numbering found",
        };
        write!(f, "{msg}")
    }
}

pub type ParseResult = std::result::Result<ParsedEpisode, ParseFailure>;

/// Lifecycle of a file through the parse/move pipeline.
///
/// Forward path is `Unparsed → Parsed → Verifying → Moving → Renamed/Copied`;
/// everything else is a terminal side exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveStatus {
    Unparsed,
    FailedToParse,
    Parsed,
    Verifying,
    Moving,
    Renamed,
    Copied,
    Misnamed,
    AlreadyInPlace,
    NoFileFound,
    FailedToMove,
}

impl MoveStatus {
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Unparsed | Self::Parsed | Self::Verifying | Self::Moving)
    }

    /// The file ended up where it belongs.
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Renamed | Self::Copied | Self::AlreadyInPlace)
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unparsed => "unparsed",
            Self::FailedToParse => "failed to parse",
            Self::Parsed => "parsed",
            Self::Verifying => "verifying",
            Self::Moving => "moving",
            Self::Renamed => "renamed",
            Self::Copied => "copied",
            Self::Misnamed => "misnamed",
            Self::AlreadyInPlace => "already in place",
            Self::NoFileFound => "no such file",
            Self::FailedToMove => "failed to move",
        };
        write!(f, "{label}")
    }
}

/// One media file moving through the pipeline.
///
/// The parser fills the parse fields, the mover fills the move fields, and
/// the record travels by ownership: parser → orchestrator → exactly one
/// mover → back in the move result. Nothing mutates it from two places.
#[derive(Debug, Clone)]
pub struct FileEpisode {
    path: PathBuf,
    parse: Option<ParseResult>,
    status: MoveStatus,
    moved_to: Option<PathBuf>,
}

impl FileEpisode {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            parse: None,
            status: MoveStatus::Unparsed,
            moved_to: None,
        }
    }

    /// Record with its parse outcome already applied.
    pub fn parsed(path: PathBuf, parse: ParseResult) -> Self {
        let status = match parse {
            Ok(_) => MoveStatus::Parsed,
            Err(_) => MoveStatus::FailedToParse,
        };
        Self {
            path,
            parse: Some(parse),
            status,
            moved_to: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn status(&self) -> MoveStatus {
        self.status
    }

    /// Advance the state machine. Terminal move states stick; a late
    /// attempt to leave one is dropped with a log line rather than
    /// honored. `FailedToParse` is terminal only for the parse stage: a
    /// mover run against such a record still owns the move-stage fields,
    /// and its outcome replaces the parse verdict.
    pub fn set_status(&mut self, status: MoveStatus) {
        if self.status == MoveStatus::FailedToParse {
            self.status = status;
            return;
        }
        if self.status.is_terminal() && status != self.status {
            tracing::debug!(
                path = %self.path.display(),
                current = %self.status,
                requested = %status,
                "ignoring status change on terminal episode"
            );
            return;
        }
        self.status = status;
    }

    pub fn parse_result(&self) -> Option<&ParseResult> {
        self.parse.as_ref()
    }

    pub fn parsed_episode(&self) -> Option<&ParsedEpisode> {
        match &self.parse {
            Some(Ok(parsed)) => Some(parsed),
            _ => None,
        }
    }

    pub fn placement(&self) -> Option<EpisodePlacement> {
        self.parsed_episode().map(|p| p.placement)
    }

    /// Filename suffix including the dot, e.g. `".mkv"`. Empty when the
    /// source has no extension.
    pub fn suffix(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn moved_to(&self) -> Option<&Path> {
        self.moved_to.as_deref()
    }

    pub fn set_moved_to(&mut self, dest: PathBuf) {
        self.moved_to = Some(dest);
    }
}

// Two records are the same episode-file if they point at the same path.
impl PartialEq for FileEpisode {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for FileEpisode {}

impl Hash for FileEpisode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

/// Normalize show name for comparison (lowercase, no spaces/dots/years)
pub fn normalize_show_name(name: &str) -> String {
    // Remove year patterns like (2016), [2016], or just 2016 at the end
    let re: &Regex = regex!(r"\s*[\(\[]?\d{4}[\)\]]?\s*$");

    let without_year = re.replace(name, "");

    without_year
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_display_single() {
        let placement = EpisodePlacement::new(1, 2);
        assert_eq!(placement.to_string(), "S01E02");
    }

    #[test]
    fn test_placement_display_span() {
        let placement = EpisodePlacement::span(1, 4, 6);
        assert_eq!(placement.to_string(), "S01E04-06");
        assert!(placement.is_span());
        assert_eq!(placement.episode, 4);
    }

    #[test]
    fn test_placement_same_slot_ignores_span() {
        let single = EpisodePlacement::new(2, 4);
        let span = EpisodePlacement::span(2, 4, 6);
        assert!(single.same_slot(&span));
        assert!(!single.same_slot(&EpisodePlacement::new(2, 5)));
    }

    #[test]
    fn test_parsed_constructor_sets_status() {
        let ok = FileEpisode::parsed(
            PathBuf::from("/d/show.s01e02.mkv"),
            Ok(ParsedEpisode {
                show: "show".to_string(),
                placement: EpisodePlacement::new(1, 2),
                resolution: None,
            }),
        );
        assert_eq!(ok.status(), MoveStatus::Parsed);

        let bad = FileEpisode::parsed(
            PathBuf::from("/d/junk.mkv"),
            Err(ParseFailure::NoSeasonEpisode),
        );
        assert_eq!(bad.status(), MoveStatus::FailedToParse);
        assert!(bad.parsed_episode().is_none());
    }

    #[test]
    fn test_terminal_status_sticks() {
        let mut episode = FileEpisode::new(PathBuf::from("/d/a.mkv"));
        episode.set_status(MoveStatus::Moving);
        episode.set_status(MoveStatus::Renamed);
        episode.set_status(MoveStatus::FailedToMove);
        assert_eq!(episode.status(), MoveStatus::Renamed);
    }

    #[test]
    fn test_move_outcome_supersedes_parse_failure() {
        let mut episode = FileEpisode::parsed(
            PathBuf::from("/d/junk.mkv"),
            Err(ParseFailure::NoSeasonEpisode),
        );
        assert_eq!(episode.status(), MoveStatus::FailedToParse);
        episode.set_status(MoveStatus::Moving);
        episode.set_status(MoveStatus::NoFileFound);
        assert_eq!(episode.status(), MoveStatus::NoFileFound);
    }

    #[test]
    fn test_suffix_with_and_without_extension() {
        let with_ext = FileEpisode::new(PathBuf::from("/d/show.s01e02.mkv"));
        assert_eq!(with_ext.suffix(), ".mkv");

        let without = FileEpisode::new(PathBuf::from("/d/noext"));
        assert_eq!(without.suffix(), "");
    }

    #[test]
    fn test_episode_equality_by_path() {
        let a = FileEpisode::new(PathBuf::from("/d/a.mkv"));
        let mut b = FileEpisode::new(PathBuf::from("/d/a.mkv"));
        b.set_status(MoveStatus::Moving);
        assert_eq!(a, b);
    }

    #[test]
    fn test_failure_messages() {
        assert!(ParseFailure::FilenameTooShort.to_string().contains("short"));
        assert!(ParseFailure::NoAlphanumeric.to_string().contains("alphanumeric"));
        assert!(ParseFailure::NoShowName.to_string().contains("show name"));
        assert!(ParseFailure::NoSeasonEpisode.to_string().contains("season/episode"));
    }

    #[test]
    fn test_normalize_show_name() {
        assert_eq!(
            normalize_show_name("Breaking Bad"),
            normalize_show_name("breaking.bad")
        );

        // Year stripping
        assert_eq!(
            normalize_show_name("Stranger Things"),
            normalize_show_name("Stranger Things (2016)")
        );
        assert_eq!(normalize_show_name("The Wire (2002)"), "thewire");

        // Country codes are kept
        assert_eq!(normalize_show_name("The Office (US)"), "theofficeus");
    }

    #[test]
    fn test_status_classification() {
        assert!(MoveStatus::Renamed.is_terminal());
        assert!(MoveStatus::Renamed.is_success());
        assert!(MoveStatus::Copied.is_success());
        assert!(MoveStatus::AlreadyInPlace.is_success());
        assert!(!MoveStatus::Moving.is_terminal());
        assert!(MoveStatus::Misnamed.is_terminal());
        assert!(!MoveStatus::Misnamed.is_success());
        assert!(!MoveStatus::FailedToMove.is_success());
    }
}
