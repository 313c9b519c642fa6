use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use super::styling::{bright, bright_green, bright_red, bright_yellow, cyan, dim};
use super::tables::{count_cell, create_table, cyan_header, pass_rate_cell};
use crate::assembly::OpTestsByJob;
use crate::failures::Failures;
use crate::schema::{CompleteBenchmarkRun, Pipeline};

/// Everything one `collect` run produced.
pub struct CollectSummary<'a> {
    pub pipeline: &'a Pipeline,
    pub op_tests: &'a OpTestsByJob,
    pub benchmark_runs: &'a [CompleteBenchmarkRun],
    pub failures: &'a Failures,
}

/// Prints the per-job overview of a collected pipeline to stderr.
///
/// Shows the pipeline, one row per job with test, skip, failure and operator
/// test counts, and every recorded failure.
pub fn print_summary(summary: &CollectSummary<'_>) {
    eprintln!("{}", render_summary(summary));
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn render_summary(summary: &CollectSummary<'_>) -> String {
    let pipeline = summary.pipeline;
    let mut output = String::new();

    add_section_header(&mut output, "📊", "Pipeline");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        cyan(format!(
            "{} #{}",
            pipeline.name,
            pipeline.github_pipeline_id.unwrap_or_default()
        )),
        dim("Project:"),
        cyan(pipeline.project.as_deref().unwrap_or("unknown")),
        dim("Commit:"),
        dim(&pipeline.git_commit_hash),
        dim("Benchmark runs:"),
        bright_yellow(summary.benchmark_runs.len()),
    );

    if pipeline.jobs.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No jobs collected."));
    } else {
        add_section_header(&mut output, "🧪", "Jobs");

        let mut table = create_table();
        table.set_header(cyan_header(&[
            "Job ID", "Job", "Status", "Tests", "Failed", "Skipped", "Pass Rate", "Op Tests",
        ]));

        for job in &pipeline.jobs {
            let job_id = job.github_job_id.unwrap_or_default();
            let skipped = job.tests.iter().filter(|t| t.skipped).count();
            let failed = job
                .tests
                .iter()
                .filter(|t| !t.success && !t.skipped)
                .count();
            let ran = job.tests.len() - skipped;
            let status = if job.job_success {
                Cell::new(&job.job_status).fg(TableColor::Green)
            } else {
                Cell::new(&job.job_status).fg(TableColor::Red)
            };

            table.add_row(vec![
                Cell::new(job_id),
                Cell::new(&job.name),
                status,
                Cell::new(job.tests.len()),
                count_cell(failed, true),
                count_cell(skipped, false),
                pass_rate_cell(ran - failed, ran),
                Cell::new(summary.op_tests.get(&job_id).map_or(0, Vec::len)),
            ]);
        }
        let _ = writeln!(output, "{table}\n");
    }

    if summary.failures.has_failures() {
        add_section_header(
            &mut output,
            "❌",
            &format!("Failures ({})", summary.failures.len()),
        );
        for failure in summary.failures.entries() {
            let _ = writeln!(output, "  {} {failure}", bright_red("•"));
        }
    } else {
        let _ = writeln!(output, "{}", bright_green("No failures recorded ✓"));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::job_fixtures::{job, pipeline, ts};
    use crate::schema::test_fixtures::test_named;

    #[test]
    fn test_render_summary_with_jobs() {
        let mut build = job(7, "build-artifact");
        build.job_success = false;
        build.job_status = "failure".to_string();
        let mut unit = job(8, "unit-tests");
        let mut failed = test_named("test_b", ts(7, 12));
        failed.success = false;
        let mut skipped = test_named("test_c", ts(7, 13));
        skipped.skipped = true;
        unit.tests = vec![test_named("test_a", ts(7, 11)), failed, skipped];

        let pipeline = pipeline("tt-metal", vec![build, unit]);
        let op_tests = OpTestsByJob::new();
        let mut failures = Failures::new();
        failures.record("report_8.xml", "Test.filepath: field required");

        let output = render_summary(&CollectSummary {
            pipeline: &pipeline,
            op_tests: &op_tests,
            benchmark_runs: &[],
            failures: &failures,
        });

        assert!(output.contains("tt-metal"));
        assert!(output.contains("build-artifact"));
        assert!(output.contains("unit-tests"));
        assert!(output.contains("50.0%"));
        assert!(output.contains("Failures (1)"));
        assert!(output.contains("report_8.xml: Test.filepath: field required"));
    }

    #[test]
    fn test_render_summary_without_jobs() {
        let pipeline = pipeline("tt-metal", vec![]);
        let output = render_summary(&CollectSummary {
            pipeline: &pipeline,
            op_tests: &OpTestsByJob::new(),
            benchmark_runs: &[],
            failures: &Failures::new(),
        });

        assert!(output.contains("No jobs collected"));
        assert!(output.contains("No failures recorded"));
    }
}
