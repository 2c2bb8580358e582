use crate::types::{MatchMode, WatchEntry};
use tracing::debug;

/// Decide whether one registered entry matches the searchable text blob.
///
/// Regex patterns are compiled here, at match time; a pattern that fails to
/// compile counts as a non-match so one bad registration can never abort the
/// scan of the remaining entries.
pub fn entry_matches(blob: &str, entry: &WatchEntry) -> bool {
    match entry.mode {
        MatchMode::Partial => blob.contains(&entry.word),
        MatchMode::Exact => blob == entry.word,
        MatchMode::Regex => match regex::Regex::new(&entry.word) {
            Ok(re) => re.is_match(blob),
            Err(e) => {
                debug!("Skipping unparsable regex entry {}: {}", entry.id, e);
                false
            }
        },
    }
}
