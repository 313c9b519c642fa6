use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require_finite, require_non_empty, Attributes, Validate, ValidationError};

/// A single named measurement taken within a benchmark run, iteration and step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkMeasurement {
    pub step_start_ts: DateTime<Utc>,
    pub step_end_ts: DateTime<Utc>,
    /// Repetition number of the step sequence
    pub iteration: i64,
    pub step_name: String,
    pub step_warm_up_num_iterations: Option<i64>,
    /// e.g. `tokens_per_sec`, `images_per_sec`, `pearson_correlation`
    pub name: String,
    pub value: f64,
    pub target: Option<f64>,
    /// Average power consumption in Watts during the step
    pub device_power: Option<f64>,
    pub device_temperature: Option<f64>,
}

impl Validate for BenchmarkMeasurement {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("BenchmarkMeasurement", "name", &self.name)?;
        require_non_empty("BenchmarkMeasurement", "step_name", &self.step_name)?;
        require_finite("BenchmarkMeasurement", "value", Some(self.value))?;
        require_finite("BenchmarkMeasurement", "target", self.target)?;
        require_finite("BenchmarkMeasurement", "device_power", self.device_power)?;
        require_finite(
            "BenchmarkMeasurement",
            "device_temperature",
            self.device_temperature,
        )?;
        Ok(())
    }
}

/// One execution of a model benchmark or evaluation.
///
/// References its pipeline and job by id only; `github_job_id` must name a job
/// of the pipeline the run was mapped against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteBenchmarkRun {
    pub run_start_ts: DateTime<Utc>,
    pub run_end_ts: DateTime<Utc>,
    /// `benchmark`, `eval`, `parameter_support_test` or a report-defined label
    pub run_type: String,
    pub git_repo_name: Option<String>,
    pub git_commit_hash: Option<String>,
    pub git_commit_ts: Option<DateTime<Utc>>,
    pub git_branch_name: Option<String>,
    pub github_pipeline_id: Option<u64>,
    pub github_pipeline_link: Option<String>,
    pub github_job_id: Option<u64>,
    pub user_name: Option<String>,
    pub docker_image: Option<String>,
    pub device_hostname: String,
    pub device_ip: Option<String>,
    pub device_info: Option<Attributes>,
    pub ml_model_name: String,
    pub ml_model_type: Option<String>,
    pub num_layers: Option<i64>,
    pub batch_size: Option<i64>,
    pub config_params: Option<Attributes>,
    pub precision: Option<String>,
    pub dataset_name: Option<String>,
    pub profiler_name: Option<String>,
    pub input_sequence_length: Option<i64>,
    pub output_sequence_length: Option<i64>,
    /// e.g. `224x224x3`
    pub image_dimension: Option<String>,
    pub perf_analysis: Option<bool>,
    pub training: Option<bool>,
    pub measurements: Vec<BenchmarkMeasurement>,
}

impl Validate for CompleteBenchmarkRun {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("CompleteBenchmarkRun", "run_type", &self.run_type)?;
        require_non_empty("CompleteBenchmarkRun", "ml_model_name", &self.ml_model_name)?;
        require_non_empty(
            "CompleteBenchmarkRun",
            "device_hostname",
            &self.device_hostname,
        )?;
        for measurement in &self.measurements {
            measurement.validate()?;
        }
        Ok(())
    }
}
