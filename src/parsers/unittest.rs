use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::junit::{self, Element};
use super::{source_name, Record};
use crate::dispatch::ParseContext;
use crate::error::Result;
use crate::failures::Failures;
use crate::schema::Test;
use crate::timestamp::{offset_by, parse_timestamp, seconds};

pub fn can_parse(path: &Path) -> bool {
    junit::peek_document(path).is_some_and(|root| is_xunit_root(&root))
}

fn is_xunit_root(root: &Element) -> bool {
    root.name == "testsuites" || root.name == "testsuite"
}

/// Hands out start timestamps that never overlap the previous test and are
/// strictly increasing across the whole report.
struct TimestampCursor {
    previous_end: DateTime<Utc>,
    last_start: Option<DateTime<Utc>>,
}

impl TimestampCursor {
    fn new(anchor: DateTime<Utc>) -> Self {
        Self {
            previous_end: anchor,
            last_start: None,
        }
    }

    fn next(
        &mut self,
        recorded: Option<DateTime<Utc>>,
        duration: Duration,
    ) -> (DateTime<Utc>, DateTime<Utc>) {
        let mut start = recorded
            .unwrap_or(self.previous_end)
            .max(self.previous_end);
        if let Some(last) = self.last_start {
            if start <= last {
                start = offset_by(last, Duration::microseconds(1));
            }
        }
        let end = offset_by(start, duration);
        self.previous_end = end;
        self.last_start = Some(start);
        (start, end)
    }
}

pub fn parse(path: &Path, context: &ParseContext, failures: &mut Failures) -> Result<Vec<Record>> {
    let source = source_name(path);
    let root = junit::read_document(path)?;
    let suites: Vec<&Element> = if root.name == "testsuite" {
        vec![&root]
    } else {
        root.children_named("testsuite").collect()
    };

    let anchor = suites
        .first()
        .and_then(|suite| suite.attr("timestamp"))
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);
    let mut cursor = TimestampCursor::new(anchor);

    let mut records = Vec::new();
    for suite in suites {
        for testcase in suite.children_named("testcase") {
            let Some(name) = testcase.attr("name") else {
                warn!("Skipping testcase without name in {source}");
                continue;
            };

            let recorded = testcase.attr("timestamp").and_then(parse_timestamp);
            let (test_start_ts, test_end_ts) =
                cursor.next(recorded, seconds(junit::duration_secs(testcase)));

            let filepath = testcase.attr("file").unwrap_or_else(|| {
                warn!("Testcase {name} in {source} has no file attribute");
                ""
            });
            let failed = junit::is_failed(testcase);
            let error = junit::is_error(testcase);

            let test = Test {
                test_start_ts,
                test_end_ts,
                test_case_name: name.to_string(),
                filepath: filepath.to_string(),
                category: testcase.attr("classname").unwrap_or_default().to_string(),
                group: Some("unittest".to_string()),
                owner: None,
                frontend: context.project.clone(),
                model_name: None,
                op_name: None,
                framework_op_name: None,
                op_kind: None,
                error_message: message(testcase),
                success: !(failed || error),
                skipped: junit::is_skipped(testcase),
                full_test_name: format!("{filepath}::{name}"),
                config: None,
                tags: None,
            };
            if let Some(test) = failures.validated(&source, test) {
                records.push(Record::Test(test));
            }
        }
    }

    debug!("Parsed {} unittest tests from {source}", records.len());
    Ok(records)
}

/// failure, then error, then skipped. Failures and errors carry their type,
/// message and body on separate lines.
fn message(testcase: &Element) -> Option<String> {
    let detailed = |tag: &str| {
        testcase.child(tag).map(|element| {
            format!(
                "{}\n{}\n{}",
                element.attr("type").unwrap_or_default(),
                element.attr("message").unwrap_or_default(),
                element.text.trim()
            )
        })
    };
    detailed("failure")
        .or_else(|| detailed("error"))
        .or_else(|| junit::skipped_message(testcase))
}
