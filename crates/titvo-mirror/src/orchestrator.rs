use futures::stream::{self, StreamExt};
use serde::Serialize;
use titvo_core::{ChangedFileSet, DownloadOutcome, Summary};

use crate::retriever::FileRetriever;

/// Per-file outcomes of a run, in changed-file-set order, with their summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadReport {
    /// Aggregate counts.
    pub summary: Summary,
    /// One entry per attempted file.
    pub outcomes: Vec<DownloadOutcome>,
}

impl DownloadReport {
    /// Outcomes that did not produce a file.
    pub fn failures(&self) -> impl Iterator<Item = &DownloadOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }
}

/// Drives a [`FileRetriever`] over every member of a [`ChangedFileSet`].
///
/// Up to `concurrency` retrievals are in flight at once. Outcomes are yielded
/// in set order regardless of completion order, and a failed file never stops
/// the run.
pub struct DownloadOrchestrator {
    retriever: FileRetriever,
    concurrency: usize,
}

impl DownloadOrchestrator {
    /// A concurrency of zero is treated as one.
    pub fn new(retriever: FileRetriever, concurrency: usize) -> Self {
        Self {
            retriever,
            concurrency: concurrency.max(1),
        }
    }

    /// Attempt every file and return the aggregate result.
    pub async fn run(&self, files: &ChangedFileSet) -> DownloadReport {
        self.run_with(files, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `observer` for each outcome in set
    /// order as soon as it is available.
    pub async fn run_with<F>(&self, files: &ChangedFileSet, mut observer: F) -> DownloadReport
    where
        F: FnMut(&DownloadOutcome),
    {
        tracing::info!(
            files = files.len(),
            concurrency = self.concurrency,
            root = %self.retriever.mirror().root().display(),
            "downloading changed files"
        );

        let outcomes: Vec<DownloadOutcome> = stream::iter(files.iter())
            .map(|file| self.retriever.retrieve(file))
            .buffered(self.concurrency)
            .inspect(|outcome| observer(outcome))
            .collect()
            .await;

        let summary = Summary::from_outcomes(&outcomes);
        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded,
            "download run finished"
        );

        DownloadReport { summary, outcomes }
    }
}
