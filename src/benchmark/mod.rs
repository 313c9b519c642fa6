//! Benchmark and evaluation reports mapped onto [`CompleteBenchmarkRun`].
//!
//! Report shapes differ per project, so the mapper is chosen by project name.
//! Every run references the job it was produced by; a report for a job the
//! pipeline does not know is dropped.

mod forge;
mod shield;

use std::fs;
use std::path::Path;

use log::{debug, error, warn};
use serde_json::{Map, Value};

use crate::failures::Failures;
use crate::schema::{Attributes, BenchmarkMeasurement, CompleteBenchmarkRun, Job, Pipeline};

/// Project-specific report mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkMapper {
    /// One run per report with an explicit `measurements` list
    Forge,
    /// One run per benchmark, eval and parameter support group
    Shield,
}

impl BenchmarkMapper {
    pub fn for_project(project: &str) -> Self {
        match project {
            "tt-shield" => Self::Shield,
            _ => Self::Forge,
        }
    }

    /// Whether `report` has the shape this mapper reads.
    pub fn accepts(self, report: &Value) -> bool {
        match self {
            Self::Forge => report.get("measurements").is_some_and(Value::is_array),
            Self::Shield => ["benchmarks", "evals", "parameter_support_tests"]
                .iter()
                .any(|key| report.get(key).is_some()),
        }
    }

    /// Maps `report` for job `job_id` of `pipeline`.
    ///
    /// Returns `None` when the job is unknown. Runs failing validation are
    /// dropped and recorded in `failures`.
    pub fn map(
        self,
        report: &Value,
        pipeline: &Pipeline,
        job_id: u64,
        source: &str,
        failures: &mut Failures,
    ) -> Option<Vec<CompleteBenchmarkRun>> {
        let Some(job) = pipeline.job(job_id) else {
            error!("Benchmark report {source} references job {job_id} which is not in the pipeline");
            return None;
        };

        let runs = match self {
            Self::Forge => forge::map(report, pipeline, job, source, failures)
                .into_iter()
                .collect(),
            Self::Shield => shield::map(report, pipeline, job, source, failures),
        };
        Some(runs)
    }
}

/// Reads and maps one benchmark report file. Reports the mapper does not
/// recognize yield nothing.
pub fn map_report_file(
    path: &Path,
    mapper: BenchmarkMapper,
    pipeline: &Pipeline,
    job_id: u64,
    failures: &mut Failures,
) -> Vec<CompleteBenchmarkRun> {
    let source = path.display().to_string();
    let report = match fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| serde_json::from_str::<Value>(&content).map_err(|e| e.to_string()))
    {
        Ok(report) => report,
        Err(e) => {
            warn!("Skipping unreadable benchmark report {source}: {e}");
            return Vec::new();
        }
    };

    if !mapper.accepts(&report) {
        debug!("{source} is not a {mapper:?} benchmark report");
        return Vec::new();
    }
    mapper
        .map(&report, pipeline, job_id, &source, failures)
        .unwrap_or_default()
}

/// Strips an organization prefix: `meta-llama/Llama-3.2-1B` -> `Llama-3.2-1B`.
pub fn normalize_model_name(name: Option<&str>) -> Option<String> {
    name.map(|name| match name.split_once('/') {
        Some((_, model)) => model.to_string(),
        None => name.to_string(),
    })
}

/// `<inference_engine>_<backend>` when both are present and non-null.
pub fn derive_model_type(fields: &Map<String, Value>) -> Option<String> {
    let engine = fields.get("inference_engine").and_then(Value::as_str)?;
    let backend = fields.get("backend").and_then(Value::as_str)?;
    Some(format!("{engine}_{backend}"))
}

/// A run carrying the pipeline and job context; model fields are left empty.
fn base_run(pipeline: &Pipeline, job: &Job, run_type: &str) -> CompleteBenchmarkRun {
    CompleteBenchmarkRun {
        run_start_ts: job.job_start_ts,
        run_end_ts: job.job_end_ts,
        run_type: run_type.to_string(),
        git_repo_name: pipeline.project.clone(),
        git_commit_hash: Some(pipeline.git_commit_hash.clone()),
        git_commit_ts: None,
        git_branch_name: pipeline.git_branch_name.clone(),
        github_pipeline_id: pipeline.github_pipeline_id,
        github_pipeline_link: pipeline.github_pipeline_link.clone(),
        github_job_id: job.github_job_id,
        user_name: Some(pipeline.git_author.clone()).filter(|name| !name.is_empty()),
        docker_image: job.docker_image.clone(),
        device_hostname: job.host_name.clone().unwrap_or_default(),
        device_ip: None,
        device_info: None,
        ml_model_name: String::new(),
        ml_model_type: None,
        num_layers: None,
        batch_size: None,
        config_params: None,
        precision: None,
        dataset_name: None,
        profiler_name: None,
        input_sequence_length: None,
        output_sequence_length: None,
        image_dimension: None,
        perf_analysis: None,
        training: None,
        measurements: Vec::new(),
    }
}

/// A measurement spanning the whole job.
fn job_measurement(job: &Job, step_name: &str, name: &str, value: f64) -> BenchmarkMeasurement {
    BenchmarkMeasurement {
        step_start_ts: job.job_start_ts,
        step_end_ts: job.job_end_ts,
        iteration: 1,
        step_name: step_name.to_string(),
        step_warm_up_num_iterations: None,
        name: name.to_string(),
        value,
        target: None,
        device_power: None,
        device_temperature: None,
    }
}

fn str_field(fields: &Value, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn int_field(fields: &Value, key: &str) -> Option<i64> {
    fields.get(key).and_then(Value::as_i64)
}

fn attributes(value: Option<&Value>) -> Option<Attributes> {
    match value {
        Some(Value::Object(map)) => Some(map.clone().into_iter().collect()),
        _ => None,
    }
}
