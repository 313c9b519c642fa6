use std::path::Path;

use chrono::Utc;
use log::{debug, warn};

use super::junit::{self, Element};
use super::{source_name, Record};
use crate::dispatch::ParseContext;
use crate::error::Result;
use crate::failures::Failures;
use crate::schema::Test;

pub fn can_parse(path: &Path) -> bool {
    junit::peek_document(path).is_some_and(|root| junit::is_pytest_report(&root))
}

pub fn parse(path: &Path, context: &ParseContext, failures: &mut Failures) -> Result<Vec<Record>> {
    let source = source_name(path);
    let root = junit::read_document(path)?;
    let now = Utc::now();

    let mut records = Vec::new();
    for suite in root.children_named("testsuite") {
        let default_start = junit::suite_timestamp(suite, now);
        for testcase in suite.children_named("testcase") {
            if !junit::is_valid_testcase(testcase) {
                warn!("Skipping testcase without name or classname in {source}");
                continue;
            }
            let test = build_test(testcase, context, default_start, &source);
            if let Some(test) = failures.validated(&source, test) {
                records.push(Record::Test(test));
            }
        }
    }

    debug!("Parsed {} pytest tests from {source}", records.len());
    Ok(records)
}

fn build_test(
    testcase: &Element,
    context: &ParseContext,
    default_start: chrono::DateTime<Utc>,
    source: &str,
) -> Test {
    let name = testcase.attr("name").unwrap_or_default();
    let classname = testcase.attr("classname").unwrap_or_default();
    let properties = testcase.properties();

    let filepath = junit::classname_to_filepath(classname);
    let (test_start_ts, test_end_ts) = junit::pytest_times(testcase, &properties, default_start);
    let failed = junit::is_failed(testcase);
    let error = junit::is_error(testcase);

    let property = |key: &str| properties.get(key).cloned();

    Test {
        test_start_ts,
        test_end_ts,
        test_case_name: junit::case_name(name).to_string(),
        category: context.category_for(classname),
        group: property("group"),
        owner: property("owner"),
        frontend: property("frontend").or_else(|| context.project.clone()),
        model_name: property("model_name"),
        op_name: property("op_name"),
        framework_op_name: property("framework_op_name"),
        op_kind: property("op_kind"),
        error_message: junit::pytest_message(testcase, &properties),
        success: !(failed || error),
        skipped: junit::is_skipped(testcase),
        full_test_name: format!("{filepath}::{name}"),
        filepath,
        config: properties
            .get("config")
            .and_then(|raw| junit::literal_attributes(raw, "config", source)),
        tags: properties
            .get("tags")
            .and_then(|raw| junit::literal_attributes(raw, "tags", source)),
    }
}
