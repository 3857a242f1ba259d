use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use titvo_core::ReportConfig;

/// Overall verdict of a Code Insights report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportResult {
    /// The scan found nothing blocking.
    Passed,
    /// The scan found blocking issues.
    Failed,
    /// No verdict yet.
    #[default]
    Pending,
}

impl fmt::Display for ReportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportResult::Passed => write!(f, "PASSED"),
            ReportResult::Failed => write!(f, "FAILED"),
            ReportResult::Pending => write!(f, "PENDING"),
        }
    }
}

impl FromStr for ReportResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passed" | "pass" => Ok(ReportResult::Passed),
            "failed" | "fail" => Ok(ReportResult::Failed),
            "pending" => Ok(ReportResult::Pending),
            other => Err(format!("unknown report result: {other}")),
        }
    }
}

/// Value type of a report data entry, as understood by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportDataType {
    Boolean,
    Date,
    Duration,
    Link,
    Number,
    Percentage,
    Text,
}

/// One key/value entry shown on the report.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::report::ReportData;
///
/// let entry = ReportData::number("Files mirrored", 12);
/// let json = serde_json::to_value(&entry).unwrap();
/// assert_eq!(json["type"], "NUMBER");
/// assert_eq!(json["value"], 12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    /// Label.
    pub title: String,
    /// How the platform renders `value`.
    #[serde(rename = "type")]
    pub data_type: ReportDataType,
    /// Entry value.
    pub value: serde_json::Value,
}

impl ReportData {
    /// A `NUMBER` entry.
    pub fn number(title: impl Into<String>, value: u64) -> Self {
        Self {
            title: title.into(),
            data_type: ReportDataType::Number,
            value: value.into(),
        }
    }

    /// A `DURATION` entry; the platform expects milliseconds.
    pub fn duration_ms(title: impl Into<String>, millis: u64) -> Self {
        Self {
            title: title.into(),
            data_type: ReportDataType::Duration,
            value: millis.into(),
        }
    }

    /// A `BOOLEAN` entry.
    pub fn boolean(title: impl Into<String>, value: bool) -> Self {
        Self {
            title: title.into(),
            data_type: ReportDataType::Boolean,
            value: value.into(),
        }
    }

    /// A `TEXT` entry.
    pub fn text(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data_type: ReportDataType::Text,
            value: serde_json::Value::String(value.into()),
        }
    }
}

/// Code Insights report payload.
///
/// The findings (`result` and `data`) are always supplied by the caller.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::report::{ReportData, ReportResult, ScanReport};
/// use titvo_core::ReportConfig;
///
/// let report = ScanReport::new(
///     &ReportConfig::default(),
///     ReportResult::Passed,
///     vec![ReportData::boolean("Safe to merge?", true)],
/// );
/// let json = serde_json::to_value(&report).unwrap();
/// assert_eq!(json["report_type"], "SECURITY");
/// assert_eq!(json["result"], "PASSED");
/// assert_eq!(json["data"][0]["type"], "BOOLEAN");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    pub title: String,
    pub details: String,
    pub report_type: String,
    pub reporter: String,
    pub result: ReportResult,
    #[serde(default)]
    pub data: Vec<ReportData>,
}

impl ScanReport {
    /// Build a report from configured labels and caller-supplied findings.
    pub fn new(config: &ReportConfig, result: ReportResult, data: Vec<ReportData>) -> Self {
        Self {
            title: config.title.clone(),
            details: config.details.clone(),
            report_type: config.report_type.clone(),
            reporter: config.reporter.clone(),
            result,
            data,
        }
    }
}

/// A fresh report id: `{reporter}-{uuid v4}`.
///
/// # Examples
///
/// ```
/// use titvo_bitbucket::report::new_report_id;
///
/// let id = new_report_id("titvo-security-scan");
/// assert!(id.starts_with("titvo-security-scan-"));
/// assert_ne!(id, new_report_id("titvo-security-scan"));
/// ```
pub fn new_report_id(reporter: &str) -> String {
    format!("{reporter}-{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_result_parses_case_insensitively() {
        assert_eq!("FAILED".parse::<ReportResult>().unwrap(), ReportResult::Failed);
        assert_eq!("pass".parse::<ReportResult>().unwrap(), ReportResult::Passed);
        assert!("unknown".parse::<ReportResult>().is_err());
    }

    #[test]
    fn report_serializes_platform_field_names() {
        let report = ScanReport::new(
            &ReportConfig::default(),
            ReportResult::Pending,
            vec![
                ReportData::duration_ms("Duration", 1500),
                ReportData::number("Files mirrored", 2),
            ],
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["title"], "Titvo Security Scan");
        assert_eq!(json["reporter"], "titvo-security-scan");
        assert_eq!(json["result"], "PENDING");
        assert_eq!(json["data"][0]["type"], "DURATION");
        assert_eq!(json["data"][0]["value"], 1500);
        assert_eq!(json["data"][1]["title"], "Files mirrored");
    }

    #[test]
    fn caller_supplied_data_deserializes() {
        let raw = r#"[
            {"title": "Vulnerabilities", "type": "NUMBER", "value": 3},
            {"title": "Safe to merge?", "type": "BOOLEAN", "value": false}
        ]"#;
        let data: Vec<ReportData> = serde_json::from_str(raw).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[1].data_type, ReportDataType::Boolean);
        assert_eq!(data[1].value, serde_json::Value::Bool(false));
    }
}
