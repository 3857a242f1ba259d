//! Bitbucket Cloud REST integration.
//!
//! Provides the client-credentials grant, the commit, diff and source
//! endpoints used to mirror a commit, and the Code Insights report payload.

pub mod auth;
pub mod client;
pub mod report;

pub use auth::AccessToken;
pub use client::BitbucketClient;
pub use report::{new_report_id, ReportData, ReportDataType, ReportResult, ScanReport};
