//! Selective retrieval of a commit's changed files into a local mirror.
//!
//! [`FileRetriever`] fetches and writes one file; [`DownloadOrchestrator`]
//! runs it over a whole [`ChangedFileSet`](titvo_core::ChangedFileSet) on a
//! bounded pool and reduces the outcomes into a
//! [`Summary`](titvo_core::Summary).

pub mod fetcher;
pub mod mirror;
pub mod orchestrator;
pub mod retriever;

pub use fetcher::SourceFetcher;
pub use mirror::Mirror;
pub use orchestrator::{DownloadOrchestrator, DownloadReport};
pub use retriever::FileRetriever;
