//! Attaches parsed reports to the jobs of a pipeline.
//!
//! A batch runs three phases over the artifacts of one pipeline: test reports
//! (attached to their job), operator test archives (grouped per job) and
//! benchmark reports (one or more runs per report). Reports are matched to jobs
//! by the job id in their file name.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};

use crate::benchmark::{self, BenchmarkMapper};
use crate::discovery::{self, BENCHMARK_EXTENSIONS, OPTEST_EXTENSIONS, TEST_EXTENSIONS};
use crate::dispatch::{self, ParseContext};
use crate::failures::Failures;
use crate::parsers::Record;
use crate::schema::{CompleteBenchmarkRun, OpTest, Pipeline, Test};
use crate::timestamp::offset_by;

/// Operator tests of a pipeline, per job id.
pub type OpTestsByJob = BTreeMap<u64, Vec<OpTest>>;

/// Context shared by every report of `pipeline`.
pub fn pipeline_context(pipeline: &Pipeline, base: &ParseContext) -> ParseContext {
    ParseContext {
        project: pipeline.project.clone(),
        branch: pipeline.git_branch_name.clone(),
        ..base.clone()
    }
}

/// Parses the test reports under `artifacts` into the tests of their jobs.
///
/// Builder reports yield operator tests rather than tests; those are returned.
pub fn collect_tests(
    pipeline: &mut Pipeline,
    artifacts: &Path,
    base: &ParseContext,
    failures: &mut Failures,
) -> OpTestsByJob {
    let context = pipeline_context(pipeline, base);
    let mut op_tests = OpTestsByJob::new();

    for (job_id, paths) in discovery::reports_by_job(artifacts, TEST_EXTENSIONS) {
        let Some(job) = pipeline.job_mut(job_id) else {
            error!("Found test reports for job {job_id} which is not in the pipeline");
            continue;
        };
        let job_context = context.for_job(job_id, Some(&job.name));

        for path in paths {
            for record in dispatch::parse_file(&path, &job_context, failures) {
                match record {
                    Record::Test(test) => job.tests.push(test),
                    Record::OpTest(op_test) => op_tests.entry(job_id).or_default().push(op_test),
                }
            }
        }
        enforce_unique_keys(&mut job.tests, job_id);
        info!("Job {job_id}: {} tests", job.tests.len());
    }

    for (job_id, records) in &mut op_tests {
        enforce_unique_keys(records, *job_id);
    }
    op_tests
}

/// Parses operator test archives under `artifacts` into `op_tests`.
pub fn collect_op_tests(
    pipeline: &Pipeline,
    artifacts: &Path,
    base: &ParseContext,
    failures: &mut Failures,
    op_tests: &mut OpTestsByJob,
) {
    let context = pipeline_context(pipeline, base);

    for (job_id, paths) in discovery::reports_by_job(artifacts, OPTEST_EXTENSIONS) {
        let Some(job) = pipeline.job(job_id) else {
            error!("Found operator test archives for job {job_id} which is not in the pipeline");
            continue;
        };
        let job_context = context.for_job(job_id, Some(&job.name));
        let records = op_tests.entry(job_id).or_default();

        for path in paths {
            for record in dispatch::parse_file(&path, &job_context, failures) {
                match record {
                    Record::OpTest(op_test) => records.push(op_test),
                    Record::Test(test) => warn!(
                        "Ignoring test {} found in archive {}",
                        test.full_test_name,
                        path.display()
                    ),
                }
            }
        }
        enforce_unique_keys(records, job_id);
        info!("Job {job_id}: {} operator tests", records.len());
    }
}

/// Maps benchmark reports under `artifacts` to benchmark runs.
pub fn collect_benchmarks(
    pipeline: &Pipeline,
    artifacts: &Path,
    failures: &mut Failures,
) -> Vec<CompleteBenchmarkRun> {
    let mapper = BenchmarkMapper::for_project(pipeline.project.as_deref().unwrap_or_default());
    debug!("Mapping benchmarks with the {mapper:?} mapper");

    let mut runs = Vec::new();
    for (job_id, paths) in discovery::reports_by_job(artifacts, BENCHMARK_EXTENSIONS) {
        for path in paths {
            runs.extend(benchmark::map_report_file(
                &path, mapper, pipeline, job_id, failures,
            ));
        }
    }
    info!("Mapped {} benchmark runs", runs.len());
    runs
}

/// A record identified within its job by name and start time.
trait Keyed {
    fn key(&self) -> (&str, DateTime<Utc>);
    fn shift(&mut self, by: Duration);
}

impl Keyed for Test {
    fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.full_test_name, self.test_start_ts)
    }

    fn shift(&mut self, by: Duration) {
        self.test_start_ts = offset_by(self.test_start_ts, by);
        self.test_end_ts = offset_by(self.test_end_ts, by);
    }
}

impl Keyed for OpTest {
    fn key(&self) -> (&str, DateTime<Utc>) {
        (&self.full_test_name, self.test_start_ts)
    }

    fn shift(&mut self, by: Duration) {
        self.test_start_ts = offset_by(self.test_start_ts, by);
        self.test_end_ts = offset_by(self.test_end_ts, by);
    }
}

/// Shifts later duplicates of `(full_test_name, start)` forward one
/// microsecond at a time until every key is unique.
fn enforce_unique_keys<T: Keyed>(records: &mut [T], job_id: u64) {
    let mut seen: HashSet<(String, DateTime<Utc>)> = HashSet::new();
    for record in records.iter_mut() {
        let mut shifted = false;
        while seen.contains(&owned_key(record)) {
            let before = record.key().1;
            record.shift(Duration::microseconds(1));
            if record.key().1 == before {
                warn!("Job {job_id}: cannot shift duplicate {} past {before}", record.key().0);
                break;
            }
            shifted = true;
        }
        if shifted {
            let (name, start) = record.key();
            warn!("Job {job_id}: shifted duplicate {name} to start at {start}");
        }
        seen.insert(owned_key(record));
    }
}

fn owned_key<T: Keyed>(record: &T) -> (String, DateTime<Utc>) {
    let (name, start) = record.key();
    (name.to_string(), start)
}
