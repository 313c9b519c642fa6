use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::assembly;
use crate::config::Config;
use crate::discovery;
use crate::dispatch::{self, ParseContext};
use crate::failures::Failures;
use crate::github;
use crate::output::{print_summary, CollectSummary, OutputWriter, PhaseProgress};
use crate::schema::Validate;

#[derive(Parser)]
#[command(name = "cicollect")]
#[command(author, version, about = "CI artifact collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file; defaults to cicollect.{toml,json,yaml,yml} in the
    /// current directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory the JSON documents are written to
    #[arg(short, long, global = true)]
    out: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect a downloaded workflow run into pipeline, benchmark and op test documents
    Collect {
        #[arg(short, long)]
        run_id: u64,

        /// Holds `<run id>/workflow.json`, `<run id>/workflow_jobs.json` and
        /// `<run id>/artifacts`
        #[arg(long, default_value = "generated/cicd")]
        output_dir: PathBuf,
    },
    /// Parse a single report and print its records
    Parse {
        file: PathBuf,

        #[arg(long)]
        project: Option<String>,

        #[arg(long)]
        job_id: Option<u64>,

        #[arg(long)]
        job_name: Option<String>,

        #[arg(short, long)]
        branch: Option<String>,
    },
}

impl Cli {
    fn load_config(&self) -> Result<Config> {
        Config::load(self.config.as_deref()).context("Failed to load configuration")
    }

    fn execute_collect(&self, run_id: u64, output_dir: &Path) -> Result<ExitCode> {
        info!("Collecting workflow run {run_id} from {}", output_dir.display());
        let config = self.load_config()?;

        let run_dir = output_dir.join(run_id.to_string());
        let (run, github_jobs) = github::load_workflow(&run_dir).with_context(|| {
            format!("Failed to read pipeline metadata from {}", run_dir.display())
        })?;
        let trigger = github::resolve_trigger(config.collect.event_name.as_deref());
        let mut pipeline = github::pipeline_from_github(&run, &github_jobs, trigger)
            .with_context(|| format!("Failed to assemble pipeline {run_id}"))?;
        pipeline
            .validate()
            .with_context(|| format!("Pipeline {run_id} is invalid"))?;

        let artifacts = discovery::artifacts_dir(output_dir, run_id);
        let base = ParseContext::from_config(&config.collect);
        let mut failures = Failures::new();

        let progress = PhaseProgress::start_tests();
        let mut op_tests = assembly::collect_tests(&mut pipeline, &artifacts, &base, &mut failures);
        let tests = pipeline.jobs.iter().map(|job| job.tests.len()).sum();

        let progress = progress.finish_tests_start_benchmarks(tests);
        let benchmark_runs = assembly::collect_benchmarks(&pipeline, &artifacts, &mut failures);

        let progress = progress.finish_benchmarks_start_op_tests(benchmark_runs.len());
        assembly::collect_op_tests(&pipeline, &artifacts, &base, &mut failures, &mut op_tests);
        progress.finish_op_tests(op_tests.values().map(Vec::len).sum());

        let out_dir = self.out.clone().unwrap_or_else(|| config.output.dir.clone());
        let writer = OutputWriter::new(out_dir, self.pretty || config.output.pretty);
        writer
            .write_pipeline(&pipeline)
            .context("Failed to write pipeline")?;
        writer
            .write_benchmark_runs(&benchmark_runs)
            .context("Failed to write benchmark runs")?;
        for (job_id, records) in &op_tests {
            writer
                .write_op_tests(*job_id, &pipeline.pipeline_start_ts, records)
                .with_context(|| format!("Failed to write op tests of job {job_id}"))?;
        }
        info!("Outputs written to: {}", writer.dir().display());

        print_summary(&CollectSummary {
            pipeline: &pipeline,
            op_tests: &op_tests,
            benchmark_runs: &benchmark_runs,
            failures: &failures,
        });

        Ok(if failures.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    fn execute_parse(
        &self,
        file: &Path,
        project: Option<&str>,
        job_id: Option<u64>,
        job_name: Option<&str>,
        branch: Option<&str>,
    ) -> Result<ExitCode> {
        let config = self.load_config()?;
        let context = ParseContext {
            project: project.map(str::to_string),
            job_id,
            job_name: job_name.map(str::to_string),
            branch: branch.map(str::to_string),
            ..ParseContext::from_config(&config.collect)
        };

        let mut failures = Failures::new();
        let records = dispatch::parse_file(file, &context, &mut failures);
        info!("Parsed {} records from {}", records.len(), file.display());

        let json_output = if self.pretty || config.output.pretty {
            serde_json::to_string_pretty(&records)?
        } else {
            serde_json::to_string(&records)?
        };
        println!("{json_output}");

        Ok(if failures.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    pub fn execute(&self) -> Result<ExitCode> {
        match &self.command {
            Commands::Collect { run_id, output_dir } => self.execute_collect(*run_id, output_dir),
            Commands::Parse {
                file,
                project,
                job_id,
                job_name,
                branch,
            } => self.execute_parse(
                file,
                project.as_deref(),
                *job_id,
                job_name.as_deref(),
                branch.as_deref(),
            ),
        }
    }
}
