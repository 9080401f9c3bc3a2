//! Pairing media files with their Takeout JSON sidecars.
//!
//! Takeout names the sidecar `<file>.json`, but long names get truncated and
//! duplicates get a `(n)` counter in odd places, so several fallbacks are
//! tried in a fixed order. The first one that hits wins.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::media::basename_of;

const JSON_SUFFIX: &str = ".json";

/// Sidecars carrying this marker are never used by the prefix strategy.
const SUPPLEMENT_MARKER: &str = ".supplement";

/// Takeout truncates names to this many characters.
const TRUNCATION_LEN: usize = 46;

/// Characters dropped from either side by the fuzzy fallback.
const FUZZY_MAX_TRIM: usize = 5;

/// A shortened name must be longer than this to count in the fuzzy fallback.
const FUZZY_MIN_SHARED: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// `IMG_123.JPG` -> `IMG_123.JPG.json`
    Exact,
    /// `IMG_123(1).JPG` -> `IMG_123(1).json`
    Title,
    /// Longest sidecar stem that prefixes the media basename
    LongestPrefix,
    /// Both names cut at 46 characters
    Truncated46,
    /// A few trailing characters trimmed from either name
    Fuzzy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidecarMatch {
    pub path: PathBuf,
    /// Sidecar filename without `.json`
    pub stem: String,
    pub strategy: MatchStrategy,
}

struct Candidate {
    path: PathBuf,
    name: String,
    stem: String,
}

/// Locate the sidecar for the media file at `media_path`.
pub fn find_sidecar(media_path: &Path) -> io::Result<Option<SidecarMatch>> {
    let Some(file_name) = media_path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let dir = match media_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let basename = basename_of(file_name);

    let exact = dir.join(format!("{file_name}{JSON_SUFFIX}"));
    if exact.is_file() {
        return Ok(Some(hit(exact, file_name, MatchStrategy::Exact)));
    }

    let title = dir.join(format!("{basename}{JSON_SUFFIX}"));
    if title.is_file() {
        return Ok(Some(hit(title, basename, MatchStrategy::Title)));
    }

    let candidates = list_candidates(dir)?;

    if let Some(c) = longest_prefix(basename, &candidates) {
        return Ok(Some(hit(c.path.clone(), &c.stem, MatchStrategy::LongestPrefix)));
    }

    if let Some(c) = candidates
        .iter()
        .find(|c| truncated_46_match(basename, &c.stem))
    {
        return Ok(Some(hit(c.path.clone(), &c.stem, MatchStrategy::Truncated46)));
    }

    if let Some(c) = candidates.iter().find(|c| fuzzy_match(basename, &c.stem)) {
        return Ok(Some(hit(c.path.clone(), &c.stem, MatchStrategy::Fuzzy)));
    }

    Ok(None)
}

fn hit(path: PathBuf, stem: &str, strategy: MatchStrategy) -> SidecarMatch {
    SidecarMatch {
        path,
        stem: stem.to_string(),
        strategy,
    }
}

/// All `.json` files in `dir`, sorted by name so every scan is deterministic.
fn list_candidates(dir: &Path) -> io::Result<Vec<Candidate>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        let Some(stem) = name.strip_suffix(JSON_SUFFIX) else {
            continue;
        };
        if !entry.file_type()?.is_file() && !entry.path().is_file() {
            continue;
        }
        candidates.push(Candidate {
            stem: stem.to_string(),
            path: entry.path(),
            name,
        });
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

/// Longest non-supplement stem that is a prefix of `basename`.
/// Equal lengths resolve to the lexicographically smallest stem.
fn longest_prefix<'a>(basename: &str, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
    let mut best: Option<&Candidate> = None;
    for c in candidates {
        if c.stem.is_empty() || c.name.contains(SUPPLEMENT_MARKER) || !basename.starts_with(&c.stem) {
            continue;
        }
        let better = match best {
            None => true,
            Some(b) => {
                let (len, best_len) = (c.stem.chars().count(), b.stem.chars().count());
                len > best_len || (len == best_len && c.stem < b.stem)
            }
        };
        if better {
            best = Some(c);
        }
    }
    best
}

/// Both names are longer than 46 characters and agree on the first 46.
pub fn truncated_46_match(basename: &str, stem: &str) -> bool {
    if basename.chars().count() <= TRUNCATION_LEN || stem.chars().count() <= TRUNCATION_LEN {
        return false;
    }
    basename.chars().take(TRUNCATION_LEN).eq(stem.chars().take(TRUNCATION_LEN))
}

/// Dropping 1..=5 trailing characters from one name leaves a prefix of the
/// other, and what is left is longer than 10 characters.
pub fn fuzzy_match(basename: &str, stem: &str) -> bool {
    (1..=FUZZY_MAX_TRIM).any(|t| trimmed_prefix_of(basename, stem, t) || trimmed_prefix_of(stem, basename, t))
}

fn trimmed_prefix_of(shortened: &str, other: &str, trim: usize) -> bool {
    let len = shortened.chars().count();
    if len <= trim || len - trim <= FUZZY_MIN_SHARED {
        return false;
    }
    let end = shortened
        .char_indices()
        .nth(len - trim)
        .map_or(shortened.len(), |(i, _)| i);
    other.starts_with(&shortened[..end])
}
