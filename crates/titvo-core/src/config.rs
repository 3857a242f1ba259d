use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TitvoError;
use crate::types::CommitRef;

/// Top-level configuration loaded from `.titvo.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
/// The configuration is built once at startup and passed by reference to
/// every component.
///
/// # Examples
///
/// ```
/// use titvo_core::TitvoConfig;
///
/// let config = TitvoConfig::default();
/// assert_eq!(config.bitbucket.timeout_secs, 30);
/// assert_eq!(config.mirror.concurrency, 4);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TitvoConfig {
    /// Platform endpoints and request limits.
    #[serde(default)]
    pub bitbucket: BitbucketConfig,
    /// Local mirror settings.
    #[serde(default)]
    pub mirror: MirrorConfig,
    /// Diff extraction settings.
    #[serde(default)]
    pub diff: DiffConfig,
    /// Code Insights report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

impl TitvoConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Io`] if the file cannot be read, or
    /// [`TitvoError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, TitvoError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Toml`] if parsing fails, or
    /// [`TitvoError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use titvo_core::TitvoConfig;
    ///
    /// let toml = r#"
    /// [mirror]
    /// output_dir = "snapshot"
    /// "#;
    /// let config = TitvoConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.mirror.output_dir.to_str(), Some("snapshot"));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TitvoError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), TitvoError> {
        if self.bitbucket.timeout_secs == 0 {
            return Err(TitvoError::Config(
                "bitbucket.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.mirror.concurrency == 0 {
            return Err(TitvoError::Config(
                "mirror.concurrency must be greater than zero".into(),
            ));
        }
        if self.mirror.output_dir.as_os_str().is_empty() {
            return Err(TitvoError::Config("mirror.output_dir is empty".into()));
        }
        Ok(())
    }
}

/// Bitbucket Cloud endpoints and request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitbucketConfig {
    /// REST API base URL (default: `https://api.bitbucket.org/2.0`).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// OAuth base URL; the token endpoint is `{oauth_url}/access_token`.
    #[serde(default = "default_oauth_url")]
    pub oauth_url: String,
    /// Deadline applied to every request and every file write (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl BitbucketConfig {
    /// The per-request deadline.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_api_url() -> String {
    "https://api.bitbucket.org/2.0".into()
}

fn default_oauth_url() -> String {
    "https://bitbucket.org/site/oauth2".into()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BitbucketConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            oauth_url: default_oauth_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Local mirror settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Root directory receiving the retrieved files (default: `repo_files`).
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Maximum downloads in flight (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("repo_files")
}

fn default_concurrency() -> usize {
    4
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
        }
    }
}

/// Diff extraction settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// What to do with a header whose b-side cannot be recovered.
    #[serde(default)]
    pub on_ambiguous: AmbiguityPolicy,
}

/// Handling of diff headers whose b-side path is ambiguous.
///
/// # Examples
///
/// ```
/// use titvo_core::AmbiguityPolicy;
///
/// let policy: AmbiguityPolicy = "fail".parse().unwrap();
/// assert_eq!(policy, AmbiguityPolicy::Fail);
/// assert_eq!(AmbiguityPolicy::default(), AmbiguityPolicy::Skip);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmbiguityPolicy {
    /// Drop the entry and log a warning.
    #[default]
    Skip,
    /// Abort extraction.
    Fail,
}

impl std::str::FromStr for AmbiguityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(AmbiguityPolicy::Skip),
            "fail" => Ok(AmbiguityPolicy::Fail),
            other => Err(format!("unknown ambiguity policy: {other}")),
        }
    }
}

/// Code Insights report settings.
///
/// # Examples
///
/// ```
/// use titvo_core::ReportConfig;
///
/// let config = ReportConfig::default();
/// assert_eq!(config.reporter, "titvo-security-scan");
/// assert_eq!(config.report_type, "SECURITY");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Report title shown on the commit.
    #[serde(default = "default_report_title")]
    pub title: String,
    /// Free-text details.
    #[serde(default = "default_report_details")]
    pub details: String,
    /// Reporter name; also the prefix of the report id.
    #[serde(default = "default_reporter")]
    pub reporter: String,
    /// One of `SECURITY`, `COVERAGE`, `TEST`, `BUG`.
    #[serde(default = "default_report_type")]
    pub report_type: String,
}

fn default_report_title() -> String {
    "Titvo Security Scan".into()
}

fn default_report_details() -> String {
    "Security scan report".into()
}

fn default_reporter() -> String {
    "titvo-security-scan".into()
}

fn default_report_type() -> String {
    "SECURITY".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_report_title(),
            details: default_report_details(),
            reporter: default_reporter(),
            report_type: default_report_type(),
        }
    }
}

/// The repository and commit a run operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunTarget {
    /// Workspace slug.
    pub workspace: String,
    /// Repository slug.
    pub repo_slug: String,
    /// Commit to mirror.
    pub commit: CommitRef,
}

impl RunTarget {
    /// Build a target, rejecting empty or route-breaking slugs.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] if a slug is empty or contains `/`.
    ///
    /// # Examples
    ///
    /// ```
    /// use titvo_core::{CommitRef, RunTarget};
    ///
    /// let commit = CommitRef::new("abc123").unwrap();
    /// let target = RunTarget::new("acme", "api", commit).unwrap();
    /// assert_eq!(target.to_string(), "acme/api@abc123");
    /// ```
    pub fn new(
        workspace: impl Into<String>,
        repo_slug: impl Into<String>,
        commit: CommitRef,
    ) -> Result<Self, TitvoError> {
        let workspace = require_slug("workspace", workspace.into())?;
        let repo_slug = require_slug("repository slug", repo_slug.into())?;
        Ok(Self {
            workspace,
            repo_slug,
            commit,
        })
    }
}

impl fmt::Display for RunTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.workspace, self.repo_slug, self.commit)
    }
}

fn require_slug(name: &str, value: String) -> Result<String, TitvoError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(TitvoError::Config(format!("{name} is empty")));
    }
    if value.contains('/') {
        return Err(TitvoError::Config(format!("invalid {name} '{value}'")));
    }
    Ok(value)
}

/// OAuth consumer credentials for the client-credentials grant.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// OAuth consumer key.
    pub client_id: String,
    /// OAuth consumer secret.
    pub client_secret: String,
}

impl Credentials {
    /// Build credentials, rejecting empty values.
    ///
    /// # Errors
    ///
    /// Returns [`TitvoError::Config`] if either value is empty.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, TitvoError> {
        let client_id = client_id.into();
        let client_secret = client_secret.into();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(TitvoError::Config(
                "OAuth client id and secret are required".into(),
            ));
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = TitvoConfig::default();
        assert_eq!(config.bitbucket.api_url, "https://api.bitbucket.org/2.0");
        assert_eq!(config.bitbucket.oauth_url, "https://bitbucket.org/site/oauth2");
        assert_eq!(config.bitbucket.timeout(), Duration::from_secs(30));
        assert_eq!(config.mirror.output_dir, PathBuf::from("repo_files"));
        assert_eq!(config.mirror.concurrency, 4);
        assert_eq!(config.diff.on_ambiguous, AmbiguityPolicy::Skip);
        assert_eq!(config.report.title, "Titvo Security Scan");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = TitvoConfig::from_toml("").unwrap();
        assert_eq!(config.mirror.concurrency, 4);
        assert_eq!(config.bitbucket.timeout_secs, 30);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[bitbucket]
api_url = "http://localhost:8080/2.0"
timeout_secs = 10

[mirror]
output_dir = "out/files"
concurrency = 8

[diff]
on_ambiguous = "fail"

[report]
reporter = "acme-scan"
"#;
        let config = TitvoConfig::from_toml(toml).unwrap();
        assert_eq!(config.bitbucket.api_url, "http://localhost:8080/2.0");
        assert_eq!(config.bitbucket.oauth_url, "https://bitbucket.org/site/oauth2");
        assert_eq!(config.bitbucket.timeout_secs, 10);
        assert_eq!(config.mirror.output_dir, PathBuf::from("out/files"));
        assert_eq!(config.mirror.concurrency, 8);
        assert_eq!(config.diff.on_ambiguous, AmbiguityPolicy::Fail);
        assert_eq!(config.report.reporter, "acme-scan");
        assert_eq!(config.report.report_type, "SECURITY");
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let result = TitvoConfig::from_toml("[mirror]\nconcurrency = 0\n");
        assert!(matches!(result, Err(TitvoError::Config(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = TitvoConfig::from_toml("[bitbucket]\ntimeout_secs = 0\n");
        assert!(matches!(result, Err(TitvoError::Config(_))));
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = TitvoConfig::from_toml("{{invalid}}");
        assert!(matches!(result, Err(TitvoError::Toml(_))));
    }

    #[test]
    fn run_target_rejects_empty_workspace() {
        let commit = CommitRef::new("abc").unwrap();
        assert!(RunTarget::new("  ", "repo", commit).is_err());
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = Credentials::new("id", "s3cret").unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("id"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn credentials_require_both_values() {
        assert!(Credentials::new("id", "").is_err());
        assert!(Credentials::new("", "secret").is_err());
    }
}
