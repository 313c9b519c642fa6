use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{source_name, Record};
use crate::dispatch::ParseContext;
use crate::error::{CollectError, Result};
use crate::failures::Failures;
use crate::schema::{Attributes, Test};
use crate::timestamp::parse_timestamp;

/// Report with a `parameter_support_tests` section, as written by model serving
/// workflows. Benchmark reports may carry the same section.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterSupportReport {
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    pub parameter_support_tests: ParameterSupportSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParameterSupportSection {
    pub model_name: Option<String>,
    pub model_impl: Option<String>,
    pub device: Option<String>,
    pub endpoint_url: Option<String>,
    /// Outcomes per group, kept raw so one malformed outcome only drops itself
    #[serde(default)]
    pub results: IndexMap<String, Vec<Value>>,
}

/// Result of one parameter value within a test group.
#[derive(Debug, Clone, Deserialize)]
pub struct ParameterOutcome {
    pub status: Option<String>,
    pub message: Option<String>,
    pub test_node_name: Option<String>,
    pub test_id: Option<String>,
    pub test_start_ts: Option<String>,
    pub test_end_ts: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Unknown,
}

impl Outcome {
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("passed" | "success" | "pass" | "ok") => Self::Pass,
            Some("failed" | "failure" | "fail" | "error") => Self::Fail,
            Some("skipped" | "skip") => Self::Skip,
            _ => Self::Unknown,
        }
    }
}

impl ParameterSupportReport {
    /// A top-level `metadata` string field, falling back to the section's own value.
    fn field(&self, key: &str, own: Option<&String>, default: &str) -> String {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| own.cloned())
            .unwrap_or_else(|| default.to_string())
    }

    pub fn model_name(&self) -> String {
        self.field(
            "model_name",
            self.parameter_support_tests.model_name.as_ref(),
            "unknown_model",
        )
    }

    pub fn model_impl(&self) -> String {
        self.field(
            "model_impl",
            self.parameter_support_tests.model_impl.as_ref(),
            "unknown_impl",
        )
    }

    pub fn device(&self) -> String {
        self.field(
            "device",
            self.parameter_support_tests.device.as_ref(),
            "unknown_device",
        )
    }

    pub fn endpoint_url(&self) -> String {
        self.field(
            "endpoint_url",
            self.parameter_support_tests.endpoint_url.as_ref(),
            "",
        )
    }

    fn config(&self) -> Attributes {
        [
            ("model_name", self.model_name()),
            ("model_impl", self.model_impl()),
            ("device", self.device()),
            ("endpoint_url", self.endpoint_url()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v)))
        .collect()
    }
}

/// Timestamp used when an outcome carries none.
pub fn sentinel_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59)
        .single()
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn read_report(path: &Path) -> Result<ParameterSupportReport> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn can_parse(path: &Path) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return false;
    }
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str::<Value>(&content).ok())
        .is_some_and(|value| {
            value
                .pointer("/parameter_support_tests/results")
                .is_some_and(Value::is_object)
        })
}

pub fn parse(path: &Path, context: &ParseContext, failures: &mut Failures) -> Result<Vec<Record>> {
    let source = source_name(path);
    let report = read_report(path)
        .map_err(|e| CollectError::Parse(format!("not a parameter support report: {e}")))?;

    let config = report.config();
    let tags: Attributes = [(
        "type".to_string(),
        Value::String("parameter_support_test".to_string()),
    )]
    .into_iter()
    .collect();
    let sentinel = sentinel_timestamp();

    let mut records = Vec::new();
    for (group, outcomes) in &report.parameter_support_tests.results {
        for (index, raw) in outcomes.iter().enumerate() {
            let outcome = match ParameterOutcome::deserialize(raw) {
                Ok(outcome) => outcome,
                Err(e) => {
                    failures.record(&source, format!("{group}[{index}]: malformed outcome: {e}"));
                    continue;
                }
            };
            let status = Outcome::from_status(outcome.status.as_deref());
            let node_name = outcome.test_node_name.as_deref();

            let test = Test {
                test_start_ts: outcome
                    .test_start_ts
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(sentinel),
                test_end_ts: outcome
                    .test_end_ts
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(sentinel),
                test_case_name: node_name
                    .map(|n| n.split('[').next().unwrap_or(n).to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                filepath: outcome
                    .test_id
                    .as_deref()
                    .and_then(|id| id.split_once("::").map(|(file, _)| file.to_string()))
                    .unwrap_or_else(|| "unknown".to_string()),
                category: "parameter_support".to_string(),
                group: Some(group.clone()),
                owner: Some("tt-shield".to_string()),
                frontend: context.project.clone(),
                model_name: Some(report.model_name()),
                op_name: None,
                framework_op_name: None,
                op_kind: None,
                error_message: matches!(status, Outcome::Fail | Outcome::Skip)
                    .then(|| outcome.message.clone())
                    .flatten(),
                success: status == Outcome::Pass,
                skipped: status == Outcome::Skip,
                full_test_name: outcome.test_id.clone().unwrap_or_else(|| {
                    format!("{group}::{}", node_name.unwrap_or("unknown"))
                }),
                config: Some(config.clone()),
                tags: Some(tags.clone()),
            };
            if let Some(test) = failures.validated(&source, test) {
                records.push(Record::Test(test));
            }
        }
    }

    if records.is_empty() {
        warn!("No parameter support outcomes in {source}");
    }
    debug!("Parsed {} parameter support tests from {source}", records.len());
    Ok(records)
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const PARAMETER_SUPPORT_REPORT: &str = r#"{
        "metadata": {"model_name": "Llama-3.1-8B-Instruct", "device": "n300"},
        "parameter_support_tests": {
            "model_name": "meta-llama/Llama-3.1-8B-Instruct",
            "model_impl": "tt-transformers",
            "endpoint_url": "http://127.0.0.1:8000",
            "results": {
                "test_n": [
                    {"status": "failed", "message": "Connection refused",
                     "test_node_name": "test_n[2]",
                     "test_id": "tests/test_params.py::test_n[2]",
                     "test_start_ts": "2025-05-01T10:00:00", "test_end_ts": "2025-05-01T10:00:03"}
                ],
                "test_max_tokens": [
                    {"status": "PASSED", "message": "ignored", "test_node_name": "test_max_tokens[16]",
                     "test_id": "tests/test_params.py::test_max_tokens[16]"},
                    {"status": "skip", "message": "not supported by backend",
                     "test_node_name": "test_max_tokens[4096]"}
                ]
            }
        }
    }"#;
}

#[cfg(test)]
mod tests {
    use super::fixtures::PARAMETER_SUPPORT_REPORT;
    use super::*;
    use crate::parsers::junit::fixtures::write_file;
    use tempfile::TempDir;

    fn parse_report(content: &str) -> Vec<Test> {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "parameter_support_12.json", content);
        assert!(can_parse(&path));
        let mut failures = Failures::new();
        parse(&path, &ParseContext::default(), &mut failures)
            .unwrap()
            .into_iter()
            .filter_map(|r| match r {
                Record::Test(t) => Some(t),
                Record::OpTest(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_status_synonyms() {
        assert_eq!(Outcome::from_status(Some("OK")), Outcome::Pass);
        assert_eq!(Outcome::from_status(Some("Error")), Outcome::Fail);
        assert_eq!(Outcome::from_status(Some("skipped")), Outcome::Skip);
        assert_eq!(Outcome::from_status(Some("xfail")), Outcome::Unknown);
        assert_eq!(Outcome::from_status(None), Outcome::Unknown);
    }

    #[test]
    fn test_can_parse_requires_results() {
        let dir = TempDir::new().unwrap();
        let other = write_file(dir.path(), "benchmark_1.json", r#"{"benchmarks": []}"#);
        let xml = write_file(dir.path(), "report_1.xml", "<testsuites/>");
        assert!(!can_parse(&other));
        assert!(!can_parse(&xml));
    }

    #[test]
    fn test_parse_failed_outcome() {
        let tests = parse_report(PARAMETER_SUPPORT_REPORT);
        assert_eq!(tests.len(), 3);

        let first = &tests[0];
        assert_eq!(first.test_case_name, "test_n");
        assert_eq!(first.group.as_deref(), Some("test_n"));
        assert_eq!(first.category, "parameter_support");
        assert_eq!(first.owner.as_deref(), Some("tt-shield"));
        assert_eq!(first.filepath, "tests/test_params.py");
        assert_eq!(first.full_test_name, "tests/test_params.py::test_n[2]");
        assert!(!first.success);
        assert_eq!(first.error_message.as_deref(), Some("Connection refused"));

        let config = first.config.as_ref().unwrap();
        assert_eq!(config["model_name"], "Llama-3.1-8B-Instruct");
        assert_eq!(config["model_impl"], "tt-transformers");
        assert_eq!(config["device"], "n300");
        assert_eq!(first.tags.as_ref().unwrap()["type"], "parameter_support_test");
    }

    #[test]
    fn test_messages_and_fallbacks() {
        let tests = parse_report(PARAMETER_SUPPORT_REPORT);

        let passed = &tests[1];
        assert!(passed.success);
        assert_eq!(passed.error_message, None);
        assert_eq!(passed.test_start_ts, sentinel_timestamp());

        let skipped = &tests[2];
        assert!(skipped.skipped);
        assert!(!skipped.success);
        assert_eq!(skipped.error_message.as_deref(), Some("not supported by backend"));
        assert_eq!(skipped.filepath, "unknown");
        assert_eq!(skipped.full_test_name, "test_max_tokens::test_max_tokens[4096]");
    }

    #[test]
    fn test_malformed_outcome_only_drops_itself() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "parameter_support_3.json",
            r#"{"parameter_support_tests": {"results": {"test_n": [
                {"status": "passed", "test_node_name": "test_n[1]"},
                {"status": "failed", "message": 42, "test_node_name": "test_n[2]"},
                {"status": "failed", "message": "n=3 not supported", "test_node_name": "test_n[3]"}
            ]}}}"#,
        );
        let mut failures = Failures::new();

        let records = parse(&path, &ParseContext::default(), &mut failures).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures.entries()[0].source, path.display().to_string());
        assert!(failures.entries()[0].message.starts_with("test_n[1]: malformed outcome"));
    }

    #[test]
    fn test_minimal_report_uses_defaults() {
        let tests = parse_report(
            r#"{"parameter_support_tests": {"results": {"test_n": [
                {"status": "failed", "message": "n=10 not supported", "test_node_name": "test_n[2]"}
            ]}}}"#,
        );
        assert_eq!(tests.len(), 1);
        assert!(!tests[0].success);
        assert_eq!(tests[0].error_message.as_deref(), Some("n=10 not supported"));
        assert_eq!(tests[0].category, "parameter_support");
        assert_eq!(tests[0].config.as_ref().unwrap()["device"], "unknown_device");
    }
}
