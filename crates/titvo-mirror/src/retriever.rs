use std::sync::Arc;
use std::time::{Duration, Instant};

use titvo_core::{ChangedFile, DownloadOutcome, FailureReason, RunTarget, TitvoError};

use crate::fetcher::SourceFetcher;
use crate::mirror::Mirror;

/// Fetches one changed file and materializes it in the mirror.
///
/// A retrieval never returns an error: every failure becomes a failed
/// [`DownloadOutcome`]. There is no retry.
#[derive(Clone)]
pub struct FileRetriever {
    fetcher: Arc<dyn SourceFetcher>,
    mirror: Arc<Mirror>,
    target: RunTarget,
    deadline: Duration,
}

impl FileRetriever {
    /// `deadline` bounds the request and the write together. A write still
    /// running when it passes is waited for and then removed, so a timed out
    /// file is never left in the mirror.
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        mirror: Arc<Mirror>,
        target: RunTarget,
        deadline: Duration,
    ) -> Self {
        Self {
            fetcher,
            mirror,
            target,
            deadline,
        }
    }

    /// The mirror files are written to.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Retrieve `file` at the target commit and write it below the mirror root.
    pub async fn retrieve(&self, file: &ChangedFile) -> DownloadOutcome {
        // Checked before any network traffic.
        if let Err(e) = self.mirror.resolve(file) {
            tracing::warn!(path = %file, error = %e, "refusing to mirror file");
            return DownloadOutcome::failed(file.clone(), FailureReason::UnsafePath);
        }

        let started = Instant::now();
        let content = match tokio::time::timeout(
            self.deadline,
            self.fetcher.fetch_source(&self.target, file),
        )
        .await
        {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                return logged(DownloadOutcome::failed(file.clone(), failure_reason(e)));
            }
            Err(_) => return logged(DownloadOutcome::failed(file.clone(), FailureReason::Timeout)),
        };

        // The write runs on its own task so a write that outlives the
        // deadline can be awaited and undone.
        let remaining = self.deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return logged(DownloadOutcome::failed(file.clone(), FailureReason::Timeout));
        }
        let mirror = Arc::clone(&self.mirror);
        let owned = file.clone();
        let mut write = tokio::spawn(async move { mirror.write(&owned, &content).await });

        let outcome = match tokio::time::timeout(remaining, &mut write).await {
            Ok(Ok(Ok(bytes))) => DownloadOutcome::written(file.clone(), bytes),
            Ok(Ok(Err(e))) => DownloadOutcome::failed(file.clone(), failure_reason(e)),
            Ok(Err(e)) => {
                DownloadOutcome::failed(file.clone(), FailureReason::Write(e.to_string()))
            }
            Err(_) => {
                let _ = write.await;
                if let Err(e) = self.mirror.remove(file).await {
                    tracing::warn!(path = %file, error = %e, "could not remove late write");
                }
                DownloadOutcome::failed(file.clone(), FailureReason::Timeout)
            }
        };
        logged(outcome)
    }
}

fn logged(outcome: DownloadOutcome) -> DownloadOutcome {
    let path = &outcome.file;
    match (&outcome.bytes_written, &outcome.failure) {
        (Some(bytes), _) => tracing::info!(%path, bytes, "downloaded"),
        (_, Some(reason)) => tracing::warn!(%path, %reason, "download failed"),
        _ => {}
    }
    outcome
}

fn failure_reason(err: TitvoError) -> FailureReason {
    match err {
        TitvoError::Status { status, .. } => FailureReason::HttpStatus(status),
        TitvoError::Timeout(_) => FailureReason::Timeout,
        TitvoError::UnsafePath(_) => FailureReason::UnsafePath,
        TitvoError::Io(e) => FailureReason::Write(e.to_string()),
        other => FailureReason::Transport(other.to_string()),
    }
}
