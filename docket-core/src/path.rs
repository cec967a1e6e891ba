//! Folder path keys and path normalization.
//!
//! Events reach the client with paths in several encodings: absolute
//! filesystem paths from the sync agent (`C:\srv\uploads\Org\x.pdf`,
//! `/srv/uploads/Org/x.pdf`), logical folder paths from the REST API
//! (`Org/Team`), and full document paths (`Org/Team/x.pdf`). All of them are
//! reduced to one [`FolderPathKey`] before any comparison happens.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root marker used when no configuration overrides it.
pub const DEFAULT_ROOT_MARKER: &str = "uploads";

// ============================================================================
// FOLDER PATH KEY
// ============================================================================

/// Canonical identity of a folder.
///
/// Lowercase, forward slashes, no leading or trailing slash, no empty
/// segments. The root folder is the empty key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FolderPathKey(String);

impl FolderPathKey {
    /// The root folder.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Normalize an arbitrary path with the default root marker.
    pub fn parse(raw: &str) -> Self {
        PathNormalizer::default().normalize(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment of the key, empty for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Parent folder, or `None` for the root.
    pub fn parent(&self) -> Option<FolderPathKey> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Append one segment. The segment is lowercased and stripped of slashes.
    pub fn join(&self, segment: &str) -> FolderPathKey {
        let segment = segment.trim().trim_matches(|c| c == '/' || c == '\\');
        if segment.is_empty() {
            return self.clone();
        }
        let segment = segment.to_lowercase().replace('\\', "/");
        if self.is_root() {
            Self(segment)
        } else {
            Self(format!("{}/{}", self.0, segment))
        }
    }

    /// True when `self` equals `ancestor` or lies beneath it.
    pub fn is_within(&self, ancestor: &FolderPathKey) -> bool {
        if ancestor.is_root() || self == ancestor {
            return true;
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// Rewrite the `from` prefix of this key to `to`.
    ///
    /// Returns `None` when the key is not inside `from`.
    pub fn rebase(&self, from: &FolderPathKey, to: &FolderPathKey) -> Option<FolderPathKey> {
        if !self.is_within(from) {
            return None;
        }
        let rest = if from.is_root() {
            self.0.as_str()
        } else {
            self.0[from.0.len()..].trim_start_matches('/')
        };
        if rest.is_empty() {
            return Some(to.clone());
        }
        if to.is_root() {
            Some(Self(rest.to_string()))
        } else {
            Some(Self(format!("{}/{}", to.0, rest)))
        }
    }
}

impl fmt::Display for FolderPathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<String> for FolderPathKey {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for FolderPathKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<FolderPathKey> for String {
    fn from(key: FolderPathKey) -> Self {
        key.0
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Canonicalizes heterogeneous path strings into [`FolderPathKey`]s.
///
/// Pure and deterministic; performs no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    root_markers: Vec<String>,
}

impl PathNormalizer {
    /// Create a normalizer with the given root markers (e.g. `uploads`).
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let root_markers = markers
            .into_iter()
            .map(|m| m.as_ref().trim_matches('/').to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        Self { root_markers }
    }

    pub fn root_markers(&self) -> &[String] {
        &self.root_markers
    }

    /// Reduce any path encoding to a folder key.
    ///
    /// Lowercases, converts backslashes, strips everything up to and
    /// including the first root marker segment, collapses empty segments and
    /// drops a trailing file-looking segment.
    pub fn normalize(&self, raw: &str) -> FolderPathKey {
        let lowered = raw.trim().to_lowercase().replace('\\', "/");
        let segments = split_segments(&lowered);
        let segments = match self.marker_position(&segments) {
            Some(idx) => &segments[idx + 1..],
            None => &segments[..],
        };
        FolderPathKey(join_folder_segments(segments))
    }

    /// Normalize a path known to name a folder.
    ///
    /// Same as [`PathNormalizer::normalize`] but keeps a dotted last segment,
    /// so `Reports/v1.2` stays a folder.
    pub fn normalize_folder(&self, raw: &str) -> FolderPathKey {
        let lowered = raw.trim().to_lowercase().replace('\\', "/");
        let segments = split_segments(&lowered);
        let segments = match self.marker_position(&segments) {
            Some(idx) => &segments[idx + 1..],
            None => &segments[..],
        };
        FolderPathKey(segments.join("/"))
    }

    /// Directory portion of an absolute filesystem path.
    ///
    /// Returns `None` when the path does not contain a root marker, meaning it
    /// cannot be mapped onto the logical folder tree.
    pub fn extract_folder_from_absolute(&self, fs_path: &str) -> Option<FolderPathKey> {
        let lowered = fs_path.trim().to_lowercase().replace('\\', "/");
        let segments = split_segments(&lowered);
        let idx = self.marker_position(&segments)?;
        Some(FolderPathKey(join_folder_segments(&segments[idx + 1..])))
    }

    /// Whether the path carries one of the configured root markers.
    pub fn is_absolute(&self, raw: &str) -> bool {
        let lowered = raw.trim().to_lowercase().replace('\\', "/");
        self.marker_position(&split_segments(&lowered)).is_some()
    }

    fn marker_position(&self, segments: &[&str]) -> Option<usize> {
        segments
            .iter()
            .position(|seg| self.root_markers.iter().any(|m| m == seg))
    }
}

impl Default for PathNormalizer {
    fn default() -> Self {
        Self::new([DEFAULT_ROOT_MARKER])
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/')
        .map(str::trim)
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect()
}

fn join_folder_segments(segments: &[&str]) -> String {
    let end = match segments.last() {
        Some(last) if looks_like_file(last) => segments.len() - 1,
        _ => segments.len(),
    };
    segments[..end].join("/")
}

/// A segment containing a dot is treated as a file name.
pub fn looks_like_file(segment: &str) -> bool {
    segment.contains('.')
}

/// Final segment of a document path, with its original case.
///
/// Returns `None` when the path ends in a folder segment.
pub fn document_name(raw: &str) -> Option<String> {
    let unified = raw.trim().replace('\\', "/");
    let last = unified
        .split('/')
        .map(str::trim)
        .filter(|seg| !seg.is_empty())
        .next_back()?;
    if looks_like_file(last) {
        Some(last.to_string())
    } else {
        None
    }
}

/// Comparison form of a document name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Full document path used as a suppression key.
pub fn document_path(folder: &FolderPathKey, name: &str) -> String {
    let name = normalize_name(name);
    if folder.is_root() {
        name
    } else {
        format!("{}/{}", folder.as_str(), name)
    }
}
