use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TitvoError;

/// Identifier of a commit on the hosting platform (usually the full hash).
///
/// # Examples
///
/// ```
/// use titvo_core::CommitRef;
///
/// let commit: CommitRef = "a1b2c3d".parse().unwrap();
/// assert_eq!(commit.as_str(), "a1b2c3d");
/// assert!("".parse::<CommitRef>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitRef(String);

impl CommitRef {
    /// Build a commit reference, rejecting empty values and values that
    /// would change the shape of an API route.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] if `value` is empty or contains `/`.
    pub fn new(value: impl Into<String>) -> Result<Self, TitvoError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TitvoError::Config("commit reference is empty".into()));
        }
        if trimmed.contains('/') {
            return Err(TitvoError::Config(format!(
                "invalid commit reference '{trimmed}'"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CommitRef {
    type Err = TitvoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A file path as it exists after the commit (the diff's b-side).
///
/// Paths are slash-delimited and relative to the repository root. Equality
/// and ordering are by path string.
///
/// # Examples
///
/// ```
/// use titvo_core::ChangedFile;
///
/// let file = ChangedFile::new("src/lib.rs").unwrap();
/// assert_eq!(file.path(), "src/lib.rs");
/// assert!(ChangedFile::new("").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangedFile(String);

impl ChangedFile {
    /// Wrap a path, returning `None` for the empty path.
    pub fn new(path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        if path.is_empty() {
            None
        } else {
            Some(Self(path))
        }
    }

    /// The relative path.
    pub fn path(&self) -> &str {
        &self.0
    }

    /// Iterate over the slash-separated components of the path.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl Borrow<str> for ChangedFile {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of files touched by a commit, unique by path and iterated in
/// ascending lexicographic order.
///
/// The set is built once (through [`FromIterator`]) and exposes no mutation.
///
/// # Examples
///
/// ```
/// use titvo_core::{ChangedFile, ChangedFileSet};
///
/// let set: ChangedFileSet = ["b.py", "a.py", "b.py"]
///     .into_iter()
///     .filter_map(ChangedFile::new)
///     .collect();
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.paths(), vec!["a.py", "b.py"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangedFileSet(BTreeSet<ChangedFile>);

impl ChangedFileSet {
    /// Number of unique files.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no file changed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if `path` is a member of the set.
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    /// Iterate in ascending path order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangedFile> {
        self.0.iter()
    }

    /// The member paths in ascending order.
    pub fn paths(&self) -> Vec<&str> {
        self.0.iter().map(ChangedFile::path).collect()
    }
}

impl FromIterator<ChangedFile> for ChangedFileSet {
    fn from_iter<I: IntoIterator<Item = ChangedFile>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a ChangedFileSet {
    type Item = &'a ChangedFile;
    type IntoIter = std::collections::btree_set::Iter<'a, ChangedFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Why a single file could not be mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum FailureReason {
    /// The platform answered with a non-200 status (404 for deleted files).
    HttpStatus(u16),
    /// The request or the write did not finish within the deadline.
    Timeout,
    /// Network-level failure before a status was received.
    Transport(String),
    /// The content was fetched but could not be written locally.
    Write(String),
    /// The path would resolve outside the mirror root.
    UnsafePath,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::HttpStatus(code) => write!(f, "HTTP {code}"),
            FailureReason::Timeout => write!(f, "timed out"),
            FailureReason::Transport(msg) => write!(f, "transport error: {msg}"),
            FailureReason::Write(msg) => write!(f, "write failed: {msg}"),
            FailureReason::UnsafePath => write!(f, "path escapes the mirror root"),
        }
    }
}

/// Result of retrieving one changed file.
///
/// # Examples
///
/// ```
/// use titvo_core::{ChangedFile, DownloadOutcome, FailureReason};
///
/// let file = ChangedFile::new("app/main.py").unwrap();
/// let ok = DownloadOutcome::written(file.clone(), 120);
/// assert!(ok.success);
/// assert_eq!(ok.bytes_written, Some(120));
///
/// let failed = DownloadOutcome::failed(file, FailureReason::HttpStatus(404));
/// assert!(!failed.success);
/// assert!(failed.bytes_written.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadOutcome {
    /// The file that was attempted.
    pub file: ChangedFile,
    /// Whether the file now exists in the mirror.
    pub success: bool,
    /// Bytes written on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<u64>,
    /// Failure cause when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl DownloadOutcome {
    /// A successful write of `bytes` bytes.
    pub fn written(file: ChangedFile, bytes: u64) -> Self {
        Self {
            file,
            success: true,
            bytes_written: Some(bytes),
            failure: None,
        }
    }

    /// A failed retrieval.
    pub fn failed(file: ChangedFile, reason: FailureReason) -> Self {
        Self {
            file,
            success: false,
            bytes_written: None,
            failure: Some(reason),
        }
    }
}

/// Aggregate result of a download run.
///
/// # Examples
///
/// ```
/// use titvo_core::Summary;
///
/// let summary = Summary { total: 3, succeeded: 2 };
/// assert_eq!(summary.failed(), 1);
/// assert_eq!(summary.to_string(), "2/3 files downloaded");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Files attempted.
    pub total: usize,
    /// Files written to the mirror.
    pub succeeded: usize,
}

impl Summary {
    /// Reduce a list of outcomes into a summary.
    pub fn from_outcomes(outcomes: &[DownloadOutcome]) -> Self {
        outcomes.iter().fold(Summary::default(), |acc, outcome| Summary {
            total: acc.total + 1,
            succeeded: acc.succeeded + usize::from(outcome.success),
        })
    }

    /// Files that could not be mirrored.
    pub fn failed(&self) -> usize {
        self.total.saturating_sub(self.succeeded)
    }

    /// Returns `true` when every attempted file was mirrored.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} files downloaded", self.succeeded, self.total)
    }
}

/// Commit metadata returned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit hash.
    pub hash: String,
    /// Commit timestamp as reported by the platform (ISO 8601).
    pub date: String,
    /// Commit message.
    pub message: String,
    /// Commit author.
    pub author: CommitAuthor,
}

/// Author block of [`CommitInfo`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    /// Raw author string, e.g. `Jane Doe <jane@example.com>`.
    pub raw: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use titvo_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> ChangedFileSet {
        paths.iter().copied().filter_map(ChangedFile::new).collect()
    }

    #[test]
    fn commit_ref_trims_whitespace() {
        let commit = CommitRef::new("  abc123\n").unwrap();
        assert_eq!(commit.as_str(), "abc123");
    }

    #[test]
    fn commit_ref_rejects_slashes() {
        assert!(CommitRef::new("abc/../def").is_err());
    }

    #[test]
    fn changed_file_set_sorts_and_dedups() {
        let files = set(&["z/last.py", "a.py", "m/mid.py", "a.py"]);
        assert_eq!(files.paths(), vec!["a.py", "m/mid.py", "z/last.py"]);
        assert!(files.contains("m/mid.py"));
        assert!(!files.contains("missing.py"));
    }

    #[test]
    fn changed_file_segments() {
        let file = ChangedFile::new("src/pkg/module.py").unwrap();
        assert_eq!(file.segments().collect::<Vec<_>>(), vec!["src", "pkg", "module.py"]);
    }

    #[test]
    fn summary_reduces_outcomes() {
        let a = ChangedFile::new("a.py").unwrap();
        let b = ChangedFile::new("b.py").unwrap();
        let outcomes = vec![
            DownloadOutcome::written(a, 10),
            DownloadOutcome::failed(b, FailureReason::Timeout),
        ];
        let summary = Summary::from_outcomes(&outcomes);
        assert_eq!(summary, Summary { total: 2, succeeded: 1 });
        assert!(!summary.is_complete());
    }

    #[test]
    fn inconsistent_summary_does_not_underflow() {
        let summary = Summary {
            total: 1,
            succeeded: 3,
        };
        assert_eq!(summary.failed(), 0);
    }

    #[test]
    fn set_lookup_by_str_matches_members() {
        let files = set(&["app/main.py", "app/main.pyc", "docs/a b/notes.md"]);
        assert!(files.contains("docs/a b/notes.md"));
        assert!(files.contains("app/main.py"));
        assert!(!files.contains("app/main"));
        assert!(!files.contains(""));
        let file = ChangedFile::new("app/main.py").unwrap();
        let key: &str = file.borrow();
        assert_eq!(key, file.path());
    }

    #[test]
    fn empty_summary_is_complete() {
        let summary = Summary::from_outcomes(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.is_complete());
    }

    #[test]
    fn failure_reason_serializes_tagged() {
        let json = serde_json::to_value(FailureReason::HttpStatus(404)).unwrap();
        assert_eq!(json["kind"], "httpStatus");
        assert_eq!(json["detail"], 404);
    }

    #[test]
    fn commit_info_deserializes_platform_payload() {
        let payload = r#"{
            "hash": "abc123",
            "date": "2024-05-01T10:00:00+00:00",
            "message": "Fix login\n",
            "author": {"raw": "Jane Doe <jane@example.com>", "type": "author"},
            "links": {}
        }"#;
        let info: CommitInfo = serde_json::from_str(payload).unwrap();
        assert_eq!(info.hash, "abc123");
        assert_eq!(info.author.raw, "Jane Doe <jane@example.com>");
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }
}
