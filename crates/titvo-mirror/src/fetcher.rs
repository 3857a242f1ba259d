use async_trait::async_trait;
use titvo_bitbucket::BitbucketClient;
use titvo_core::{ChangedFile, RunTarget, TitvoError};

/// Anything that can return a file's content at a commit.
///
/// [`BitbucketClient`] is the production implementation; tests substitute
/// in-memory fakes. Implementations must report non-200 answers as
/// [`TitvoError::Status`] and deadline expiry as [`TitvoError::Timeout`].
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `file` as it exists at `target.commit`.
    async fn fetch_source(
        &self,
        target: &RunTarget,
        file: &ChangedFile,
    ) -> Result<String, TitvoError>;
}

#[async_trait]
impl SourceFetcher for BitbucketClient {
    async fn fetch_source(
        &self,
        target: &RunTarget,
        file: &ChangedFile,
    ) -> Result<String, TitvoError> {
        self.get_source(target, file).await
    }
}
