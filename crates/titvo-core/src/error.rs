/// Errors that can occur while mirroring a commit.
///
/// Library crates use this type directly; the binary crate converts to
/// `miette::Report` at the boundary. Failures of a single file download are
/// not errors: they are recorded as a failed
/// [`DownloadOutcome`](crate::DownloadOutcome).
///
/// # Examples
///
/// ```
/// use titvo_core::TitvoError;
///
/// let err = TitvoError::CommitLookup { status: 404, body: "not found".into() };
/// assert!(err.to_string().contains("404"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum TitvoError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The client-credentials grant failed or returned no token.
    #[error("authentication failed: {0}")]
    #[diagnostic(help("check OAUTH_CLIENT_ID and OAUTH_CLIENT_SECRET"))]
    Auth(String),

    /// The commit metadata request did not return 200.
    #[error("commit not found ({status}): {body}")]
    #[diagnostic(help("check BITBUCKET_WORKSPACE, BITBUCKET_REPO_SLUG and BITBUCKET_COMMIT"))]
    CommitLookup { status: u16, body: String },

    /// The diff request did not return 200.
    #[error("failed to fetch changed files ({status}): {body}")]
    DiffFetch { status: u16, body: String },

    /// Any other request that returned an unexpected status.
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The report submission did not succeed.
    #[error("failed to publish report ({status}): {body}")]
    ReportPublish { status: u16, body: String },

    /// Network-level failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A request exceeded its deadline.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// A diff header whose b-side path cannot be recovered unambiguously.
    #[error("ambiguous diff header: {0}")]
    #[diagnostic(help("set [diff] on_ambiguous = \"skip\" to skip such entries"))]
    ExtractionAmbiguity(String),

    /// A path that would resolve outside the mirror root.
    #[error("unsafe path: {0}")]
    UnsafePath(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
