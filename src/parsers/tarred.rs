//! Tarred per-model operator dumps.
//!
//! A `run*.tar` archive holds one JSON file per model. Each top-level key of a
//! file describes one operator: its framework name, how far compilation got and
//! optionally the tensors it consumed and produced.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, warn};
use serde_json::Value;
use tar::Archive;
use walkdir::WalkDir;

use super::{source_name, Record};
use crate::dispatch::ParseContext;
use crate::error::Result;
use crate::failures::Failures;
use crate::schema::{OpTest, TensorDesc};

/// How far an operator made it through the compilation flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OpCompilationStatus {
    NotStarted = 0,
    CreatedGraph = 1,
    ConvertedToTorchIr = 2,
    ConvertedToTorchBackendIr = 3,
    ConvertedToStableHlo = 4,
    ConvertedToTtir = 5,
    ConvertedToTtnn = 6,
    Executed = 7,
}

impl OpCompilationStatus {
    pub fn from_ordinal(value: i64) -> Option<Self> {
        Some(match value {
            0 => Self::NotStarted,
            1 => Self::CreatedGraph,
            2 => Self::ConvertedToTorchIr,
            3 => Self::ConvertedToTorchBackendIr,
            4 => Self::ConvertedToStableHlo,
            5 => Self::ConvertedToTtir,
            6 => Self::ConvertedToTtnn,
            7 => Self::Executed,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::CreatedGraph => "CREATED_GRAPH",
            Self::ConvertedToTorchIr => "CONVERTED_TO_TORCH_IR",
            Self::ConvertedToTorchBackendIr => "CONVERTED_TO_TORCH_BACKEND_IR",
            Self::ConvertedToStableHlo => "CONVERTED_TO_STABLE_HLO",
            Self::ConvertedToTtir => "CONVERTED_TO_TTIR",
            Self::ConvertedToTtnn => "CONVERTED_TO_TTNN",
            Self::Executed => "EXECUTED",
        }
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

pub fn can_parse(path: &Path) -> bool {
    file_name(path).is_some_and(|name| name.starts_with("run") && name.ends_with(".tar"))
}

/// Extracted archive contents, removed again when dropped.
struct Extraction {
    root: PathBuf,
}

impl Drop for Extraction {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_dir_all(&self.root) {
            warn!("Failed to remove extraction directory {}: {e}", self.root.display());
        }
    }
}

/// Unpacks `archive` into `<scratch_dir>/<basename>`, replacing an earlier extraction.
fn extract(archive: &Path, scratch_dir: &Path) -> Result<Extraction> {
    let basename = file_name(archive).unwrap_or("archive.tar");
    let target = scratch_dir.join(basename);
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::create_dir_all(&target)?;
    let extraction = Extraction { root: target };

    let mut tar = Archive::new(File::open(archive)?);
    tar.unpack(&extraction.root)?;
    Ok(extraction)
}

pub fn parse(path: &Path, context: &ParseContext, failures: &mut Failures) -> Result<Vec<Record>> {
    let source = source_name(path);
    let extraction = extract(path, &context.scratch_dir)?;
    let root = &extraction.root;
    debug!("Extracted {source} into {}", root.display());

    let now = Utc::now();
    let mut records = Vec::new();

    let json_files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && name.ends_with(".json")
        });

    for entry in json_files {
        let json_path = entry.path();
        let relative = json_path
            .strip_prefix(root)
            .unwrap_or(json_path)
            .to_string_lossy()
            .into_owned();

        let operators = match fs::read_to_string(json_path)
            .map_err(|e| e.to_string())
            .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()))
        {
            Ok(Value::Object(operators)) => operators,
            Ok(_) => {
                warn!("Skipping {relative} in {source}: expected a JSON object");
                continue;
            }
            Err(e) => {
                warn!("Skipping unreadable {relative} in {source}: {e}");
                continue;
            }
        };

        let model_name = json_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        for (key, operator) in &operators {
            let Some(op_test) = build_op_test(key, operator, &relative, &model_name, context, now)
            else {
                continue;
            };
            if let Some(op_test) = failures.validated(&source, op_test) {
                records.push(Record::OpTest(op_test));
            }
        }
    }

    debug!("Parsed {} op tests from {source}", records.len());
    Ok(records)
}

fn build_op_test(
    key: &str,
    operator: &Value,
    relative: &str,
    model_name: &str,
    context: &ParseContext,
    now: chrono::DateTime<Utc>,
) -> Option<OpTest> {
    let raw_status = operator.get("compilation_status").and_then(Value::as_i64);
    let Some(status) = raw_status.and_then(OpCompilationStatus::from_ordinal) else {
        warn!(
            "Skipping operator {key} in {relative}: unknown compilation_status {:?}",
            operator.get("compilation_status")
        );
        return None;
    };
    let Some(torch_name) = operator.get("torch_name").and_then(Value::as_str) else {
        warn!("Skipping operator {key} in {relative}: missing torch_name");
        return None;
    };

    let executed = status == OpCompilationStatus::Executed;
    Some(OpTest {
        github_job_id: context.job_id.unwrap_or_default(),
        full_test_name: format!("{relative}::{key}"),
        test_start_ts: now,
        test_end_ts: now,
        test_case_name: key.to_string(),
        filepath: relative.to_string(),
        success: executed,
        skipped: false,
        error_message: (!executed).then(|| status.name().to_string()),
        config: None,
        frontend: context
            .project
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        model_name: model_name.to_string(),
        op_kind: String::new(),
        op_name: String::new(),
        framework_op_name: torch_name.to_string(),
        inputs: tensors(operator, "inputs", key, relative),
        outputs: tensors(operator, "outputs", key, relative),
        op_params: None,
        git_sha: None,
        status: None,
        card_type: None,
        backend: None,
    })
}

/// Tensor descriptions under `field`; absent or malformed lists become empty.
fn tensors(operator: &Value, field: &str, key: &str, relative: &str) -> Vec<TensorDesc> {
    let Some(raw) = operator.get(field) else {
        return Vec::new();
    };
    serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        warn!("Ignoring malformed {field} of operator {key} in {relative}: {e}");
        Vec::new()
    })
}


#[cfg(test)]
mod tests {
    use super::fixtures::{write_tar, RESNET_OPS};
    use super::*;
    use tempfile::TempDir;

    fn context(scratch: &Path) -> ParseContext {
        ParseContext {
            job_id: Some(7),
            scratch_dir: scratch.to_path_buf(),
            ..ParseContext::default()
        }
    }

    fn op_tests(records: Vec<Record>) -> Vec<OpTest> {
        records
            .into_iter()
            .filter_map(|r| match r {
                Record::OpTest(t) => Some(t),
                Record::Test(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_can_parse_by_name() {
        assert!(can_parse(Path::new("artifacts/run_7.tar")));
        assert!(can_parse(Path::new("run.tar")));
        assert!(!can_parse(Path::new("artifacts/models_7.tar")));
        assert!(!can_parse(Path::new("artifacts/run_7.tar.gz")));
    }

    #[test]
    fn test_status_ordinals() {
        assert_eq!(
            OpCompilationStatus::from_ordinal(5).map(OpCompilationStatus::name),
            Some("CONVERTED_TO_TTIR")
        );
        assert_eq!(OpCompilationStatus::from_ordinal(8), None);
        assert!(OpCompilationStatus::ConvertedToTtnn < OpCompilationStatus::Executed);
    }

    #[test]
    fn test_parse_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("run_7.tar");
        write_tar(
            &archive,
            &[
                ("models/resnet50.json", RESNET_OPS),
                ("models/.hidden.json", r#"{"x": {"torch_name": "a", "compilation_status": 7}}"#),
                ("models/broken.json", "{not json"),
            ],
        );
        let scratch = TempDir::new().unwrap();
        let mut failures = Failures::new();

        let tests = op_tests(parse(&archive, &context(scratch.path()), &mut failures).unwrap());

        assert_eq!(tests.len(), 2);
        let conv = &tests[0];
        assert_eq!(conv.full_test_name, "models/resnet50.json::conv_1");
        assert_eq!(conv.model_name, "resnet50");
        assert_eq!(conv.framework_op_name, "aten.convolution");
        assert_eq!(conv.frontend, "unknown");
        assert_eq!(conv.github_job_id, 7);
        assert!(conv.success);
        assert_eq!(conv.error_message, None);
        assert_eq!(conv.inputs.len(), 1);
        assert!(conv.outputs.is_empty());

        let relu = &tests[1];
        assert!(!relu.success);
        assert_eq!(relu.error_message.as_deref(), Some("NOT_STARTED"));
        assert!(!failures.has_failures());
    }

    #[test]
    fn test_malformed_operators_are_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("run_1.tar");
        write_tar(
            &archive,
            &[(
                "bert.json",
                r#"{"a": {"torch_name": "aten.add", "compilation_status": 42},
                    "b": {"compilation_status": 7},
                    "c": {"torch_name": "aten.mul", "compilation_status": 3}}"#,
            )],
        );
        let scratch = TempDir::new().unwrap();
        let mut failures = Failures::new();

        let tests = op_tests(parse(&archive, &context(scratch.path()), &mut failures).unwrap());

        assert_eq!(tests.len(), 1);
        assert_eq!(
            tests[0].error_message.as_deref(),
            Some("CONVERTED_TO_TORCH_BACKEND_IR")
        );
    }

    #[test]
    fn test_extraction_replaces_previous_directory() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("run_3.tar");
        write_tar(&archive, &[("m.json", r#"{"k": {"torch_name": "t", "compilation_status": 7}}"#)]);
        let scratch = TempDir::new().unwrap();
        let stale = scratch.path().join("run_3.tar").join("stale.json");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, r#"{"old": {"torch_name": "t", "compilation_status": 7}}"#).unwrap();

        let mut failures = Failures::new();
        let tests = op_tests(parse(&archive, &context(scratch.path()), &mut failures).unwrap());

        assert_eq!(tests.len(), 1);
        assert!(!stale.exists());
    }

    #[test]
    fn test_extraction_directory_is_removed() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("run_4.tar");
        write_tar(&archive, &[("m.json", RESNET_OPS)]);
        let garbage = dir.path().join("run_5.tar");
        fs::write(&garbage, "this is not a tar archive").unwrap();
        let scratch = TempDir::new().unwrap();
        let mut failures = Failures::new();

        let tests = op_tests(parse(&archive, &context(scratch.path()), &mut failures).unwrap());
        assert_eq!(tests.len(), 2);
        assert!(!scratch.path().join("run_4.tar").exists());

        assert!(parse(&garbage, &context(scratch.path()), &mut failures).is_err());
        assert!(!scratch.path().join("run_5.tar").exists());
    }

    #[test]
    fn test_missing_archive_is_an_error() {
        let scratch = TempDir::new().unwrap();
        let mut failures = Failures::new();
        let missing = Path::new("/nonexistent/run_9.tar");
        assert!(parse(missing, &context(scratch.path()), &mut failures).is_err());
    }
}
