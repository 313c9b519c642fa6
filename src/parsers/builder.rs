//! Builder-flavoured pytest reports.
//!
//! The builder CI flow runs single operators through the compiler and records
//! the outcome as pytest JUnit XML with extra properties: `card` and `git_sha`
//! on the suite, and `backend`, `failure_stage`, `input_shapes`,
//! `input_dtypes` and `param_*` on each testcase.

use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, warn};
use serde_json::Value;

use super::junit::{self, Element};
use super::literal::parse_literal;
use super::{source_name, Record};
use crate::dispatch::ParseContext;
use crate::error::{CollectError, Result};
use crate::failures::Failures;
use crate::schema::{Attributes, Backend, OpTest, TensorDesc, TestStatus};

const PARAM_PREFIX: &str = "param_";

pub fn can_parse(path: &Path) -> bool {
    junit::peek_document(path).is_some_and(|root| {
        junit::is_pytest_report(&root)
            && root
                .child("testsuite")
                .is_some_and(|suite| suite.properties().contains_key("card"))
    })
}

/// Suite properties every builder report carries.
struct SuiteMetadata {
    card: String,
    git_sha: String,
}

impl SuiteMetadata {
    fn from_suite(suite: &Element) -> Result<Self> {
        let mut properties = suite.properties();
        let mut required = |key: &str| {
            properties
                .shift_remove(key)
                .ok_or_else(|| CollectError::Parse(format!("testsuite is missing the `{key}` property")))
        };
        Ok(Self {
            card: required("card")?,
            git_sha: required("git_sha")?,
        })
    }
}

pub fn parse(path: &Path, context: &ParseContext, failures: &mut Failures) -> Result<Vec<Record>> {
    let source = source_name(path);
    let root = junit::read_document(path)?;
    let now = Utc::now();

    let mut records = Vec::new();
    for suite in root.children_named("testsuite") {
        let metadata = SuiteMetadata::from_suite(suite)?;
        let default_start = junit::suite_timestamp(suite, now);

        for testcase in suite.children_named("testcase") {
            if !junit::is_valid_testcase(testcase) {
                warn!("Skipping testcase without name or classname in {source}");
                continue;
            }
            let Some(op_test) =
                build_op_test(testcase, &metadata, context, default_start, &source, failures)?
            else {
                continue;
            };
            if let Some(op_test) = failures.validated(&source, op_test) {
                records.push(Record::OpTest(op_test));
            }
        }
    }

    debug!("Parsed {} builder op tests from {source}", records.len());
    Ok(records)
}

fn build_op_test(
    testcase: &Element,
    metadata: &SuiteMetadata,
    context: &ParseContext,
    default_start: chrono::DateTime<Utc>,
    source: &str,
    failures: &mut Failures,
) -> Result<Option<OpTest>> {
    let name = testcase.attr("name").unwrap_or_default();
    let classname = testcase.attr("classname").unwrap_or_default();
    let properties = testcase.properties();
    let required = |key: &str| {
        properties
            .get(key)
            .ok_or_else(|| CollectError::Parse(format!("testcase {name} is missing the `{key}` property")))
    };

    let raw_backend = required("backend")?;
    let Some(backend) = Backend::from_property(raw_backend) else {
        failures.record(source, format!("OpTest.backend: unknown backend {raw_backend:?} in {name}"));
        return Ok(None);
    };

    let failed = junit::is_failed(testcase);
    let error = junit::is_error(testcase);
    let skipped = junit::is_skipped(testcase);

    let status = match properties.get("failure_stage") {
        Some(stage) => Some(TestStatus::from_failure_stage(stage).ok_or_else(|| {
            CollectError::Parse(format!("testcase {name} has an unknown failure_stage {stage:?}"))
        })?),
        None if skipped => None,
        None if failed || error => Some(TestStatus::RunFailed),
        None => Some(TestStatus::Success),
    };

    let shapes = required("input_shapes")?;
    let dtypes = required("input_dtypes")?;
    let inputs = tensor_inputs(shapes, dtypes).unwrap_or_else(|e| {
        warn!("Could not decode inputs of {name} in {source}: {e}");
        Vec::new()
    });

    let params = params(&properties);
    let filepath = junit::classname_to_filepath(classname);
    let test_case_name = junit::case_name(name).to_string();
    let (test_start_ts, test_end_ts) = junit::pytest_times(testcase, &properties, default_start);

    Ok(Some(OpTest {
        github_job_id: context.job_id.unwrap_or_default(),
        full_test_name: format!("{filepath}::{name}"),
        test_start_ts,
        test_end_ts,
        filepath,
        success: !(failed || error),
        skipped,
        error_message: junit::pytest_message(testcase, &properties),
        config: params.clone(),
        frontend: context
            .project
            .clone()
            .unwrap_or_else(|| "builder".to_string()),
        model_name: "builder_ops".to_string(),
        op_kind: "builder_op".to_string(),
        op_name: properties
            .get("op_name")
            .cloned()
            .unwrap_or_else(|| test_case_name.clone()),
        framework_op_name: properties
            .get("framework_op_name")
            .cloned()
            .unwrap_or_else(|| test_case_name.clone()),
        test_case_name,
        inputs,
        outputs: Vec::new(),
        op_params: params,
        git_sha: Some(metadata.git_sha.clone()),
        status,
        card_type: Some(metadata.card.clone()),
        backend: Some(backend),
    }))
}

/// Zips literal-encoded shape and dtype lists into tensor descriptions.
/// A scalar shape `n` is a one-dimensional `[n]`.
fn tensor_inputs(shapes: &str, dtypes: &str) -> Result<Vec<TensorDesc>> {
    let shapes = match parse_literal(shapes)? {
        Value::Array(items) => items,
        other => return Err(CollectError::Parse(format!("input_shapes is not a list: {other}"))),
    };
    let dtypes = match parse_literal(dtypes)? {
        Value::Array(items) => items,
        other => return Err(CollectError::Parse(format!("input_dtypes is not a list: {other}"))),
    };

    shapes
        .iter()
        .zip(&dtypes)
        .map(|(shape, dtype)| {
            let dims = match shape {
                Value::Array(dims) => dims.iter().map(dimension).collect::<Result<Vec<_>>>()?,
                scalar => vec![dimension(scalar)?],
            };
            let data_type = match dtype {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Ok(TensorDesc::with_defaults(dims, data_type))
        })
        .collect()
}

fn dimension(value: &Value) -> Result<i64> {
    value
        .as_i64()
        .ok_or_else(|| CollectError::Parse(format!("invalid dimension {value}")))
}

/// `param_*` properties with the prefix stripped; values are decoded as
/// literals when possible and kept as strings otherwise.
fn params(properties: &IndexMap<String, String>) -> Option<Attributes> {
    let params: Attributes = properties
        .iter()
        .filter_map(|(key, raw)| {
            let key = key.strip_prefix(PARAM_PREFIX)?;
            let value = parse_literal(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            Some((key.to_string(), value))
        })
        .collect();
    (!params.is_empty()).then_some(params)
}
