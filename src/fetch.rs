//! The `titvo fetch` pipeline: authenticate, confirm the commit, extract the
//! changed-file set, mirror it, and publish a Code Insights report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use titvo_bitbucket::{new_report_id, BitbucketClient, ReportData, ReportResult, ScanReport};
use titvo_core::{CommitInfo, Credentials, ReportConfig, RunTarget, Summary, TitvoConfig, TitvoError};
use titvo_difflens::Extraction;
use titvo_mirror::{DownloadOrchestrator, DownloadReport, FileRetriever, Mirror};

/// Per-run choices that do not belong in `.titvo.toml`.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Publish a report once retrieval is done.
    pub publish_report: bool,
    /// Verdict attached to the report.
    pub report_result: ReportResult,
    /// Caller-supplied report entries, appended after the measured ones.
    pub report_data: Vec<ReportData>,
    /// Draw a progress bar on stderr.
    pub progress: bool,
}

/// Everything a completed run produced.
///
/// Failures after the commit lookup do not abort the run; they are collected
/// in `errors` so the report can still be published.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    pub target: String,
    pub commit: CommitInfo,
    pub output_dir: PathBuf,
    /// Diff headers dropped because their path could not be recovered.
    pub skipped_headers: Vec<String>,
    pub download: DownloadReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(serialize_with = "error_messages")]
    pub errors: Vec<TitvoError>,
}

fn error_messages<S: Serializer>(errors: &[TitvoError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

/// Run the whole pipeline for `target`.
///
/// # Errors
///
/// Returns early only when the mirror root cannot be created, when no access
/// token can be obtained, or when the commit lookup fails. Every later
/// failure is recorded in [`FetchOutcome::errors`].
pub async fn run(
    config: &TitvoConfig,
    target: &RunTarget,
    credentials: &Credentials,
    options: FetchOptions,
) -> Result<FetchOutcome, TitvoError> {
    let started = Instant::now();

    let mirror = Arc::new(Mirror::new(&config.mirror.output_dir));
    mirror.prepare().await?;

    let client = Arc::new(BitbucketClient::authenticate(&config.bitbucket, credentials).await?);
    tracing::debug!(api = %client.api_url(), "authenticated");

    let commit = client.get_commit(target).await?;
    tracing::info!(
        hash = %commit.hash,
        date = %commit.date,
        author = %commit.author.raw,
        "commit found"
    );

    let mut errors = Vec::new();
    let extraction = match client
        .get_diff(target)
        .await
        .and_then(|diff| titvo_difflens::extract(&diff, config.diff.on_ambiguous))
    {
        Ok(extraction) => extraction,
        Err(e) => {
            tracing::error!(error = %e, "could not determine changed files");
            errors.push(e);
            Extraction::default()
        }
    };

    let retriever = FileRetriever::new(
        client.clone(),
        mirror,
        target.clone(),
        config.bitbucket.timeout(),
    );
    let orchestrator = DownloadOrchestrator::new(retriever, config.mirror.concurrency);

    let progress = options
        .progress
        .then(|| progress_bar(extraction.files.len() as u64));
    let download = orchestrator
        .run_with(&extraction.files, |outcome| {
            if let Some(pb) = &progress {
                pb.set_message(outcome.file.path().to_string());
                pb.inc(1);
            }
        })
        .await;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let report_id = if options.publish_report {
        let report = build_report(
            &config.report,
            options.report_result,
            &download.summary,
            started.elapsed(),
            options.report_data,
        );
        let id = new_report_id(&config.report.reporter);
        match client.create_report(target, &id, &report).await {
            Ok(_) => {
                tracing::info!(report_id = %id, result = %report.result, "report published");
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "report was not published");
                errors.push(e);
                None
            }
        }
    } else {
        None
    };

    Ok(FetchOutcome {
        target: target.to_string(),
        commit,
        output_dir: config.mirror.output_dir.clone(),
        skipped_headers: extraction.ambiguous,
        download,
        report_id,
        errors,
    })
}

/// The report for a finished run: measured values first, then `extra`.
pub fn build_report(
    config: &ReportConfig,
    result: ReportResult,
    summary: &Summary,
    elapsed: Duration,
    extra: Vec<ReportData>,
) -> ScanReport {
    let mut data = vec![
        ReportData::duration_ms("Duration", elapsed.as_millis() as u64),
        ReportData::number("Files changed", summary.total as u64),
        ReportData::number("Files mirrored", summary.succeeded as u64),
        ReportData::number("Files failed", summary.failed() as u64),
    ];
    data.extend(extra);
    ScanReport::new(config, result, data)
}

/// Read report entries from a JSON file holding an array of
/// `{"title", "type", "value"}` objects.
///
/// # Errors
///
/// Returns [`TitvoError::Io`] if the file cannot be read and
/// [`TitvoError::Serialization`] if it is not such an array.
pub fn load_report_data(path: &Path) -> Result<Vec<ReportData>, TitvoError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn progress_bar(len: u64) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(len);
    if let Ok(style) =
        indicatif::ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {wide_msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Human-readable rendering of a run.
pub fn render_text(outcome: &FetchOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!("Commit:  {}\n", outcome.commit.hash));
    out.push_str(&format!("Date:    {}\n", outcome.commit.date));
    out.push_str(&format!("Author:  {}\n", outcome.commit.author.raw));
    out.push_str(&format!("Message: {}\n", outcome.commit.message.trim_end()));
    out.push('\n');

    for o in &outcome.download.outcomes {
        match (&o.bytes_written, &o.failure) {
            (Some(bytes), _) => out.push_str(&format!("  ok    {} ({bytes} bytes)\n", o.file)),
            (_, Some(reason)) => out.push_str(&format!("  fail  {} ({reason})\n", o.file)),
            _ => {}
        }
    }
    for header in &outcome.skipped_headers {
        out.push_str(&format!("  skip  {header}\n"));
    }
    if !outcome.download.outcomes.is_empty() || !outcome.skipped_headers.is_empty() {
        out.push('\n');
    }

    out.push_str(&format!(
        "{} into {}\n",
        outcome.download.summary,
        outcome.output_dir.display()
    ));
    if let Some(id) = &outcome.report_id {
        out.push_str(&format!("Report:  {id}\n"));
    }
    out
}
