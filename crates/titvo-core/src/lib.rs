//! Core types, configuration, and error handling for titvo.
//!
//! This crate provides the shared foundation used by all other titvo crates:
//! - [`TitvoError`]: unified error type using `thiserror`
//! - [`TitvoConfig`]: configuration loaded from `.titvo.toml`
//! - Shared types: [`CommitRef`], [`ChangedFile`], [`ChangedFileSet`],
//!   [`DownloadOutcome`], [`Summary`], [`CommitInfo`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    AmbiguityPolicy, BitbucketConfig, Credentials, DiffConfig, MirrorConfig, ReportConfig,
    RunTarget, TitvoConfig,
};
pub use error::TitvoError;
pub use types::{
    ChangedFile, ChangedFileSet, CommitAuthor, CommitInfo, CommitRef, DownloadOutcome,
    FailureReason, OutputFormat, Summary,
};

/// A convenience `Result` type for titvo operations.
pub type Result<T> = std::result::Result<T, TitvoError>;
