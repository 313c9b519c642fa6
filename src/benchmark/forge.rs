use serde_json::Value;

use super::{attributes, base_run, int_field, str_field};
use crate::failures::Failures;
use crate::schema::{BenchmarkMeasurement, CompleteBenchmarkRun, Job, Pipeline, ValidationError};

/// Maps a single-run report: model metadata at the top level and every
/// sample under `measurements`.
///
/// The run spans the whole pipeline, while each measurement spans its job.
pub(super) fn map(
    report: &Value,
    pipeline: &Pipeline,
    job: &Job,
    source: &str,
    failures: &mut Failures,
) -> Option<CompleteBenchmarkRun> {
    let measurements = match report
        .get("measurements")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .map(|entry| measurement(entry, job))
                .collect::<Result<Vec<_>, _>>()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
    {
        Ok(measurements) => measurements,
        Err(e) => {
            failures.record(source, e);
            return None;
        }
    };

    let run_type = str_field(report, "run_type").unwrap_or_default();
    let mut run = base_run(pipeline, job, &run_type);
    run.run_start_ts = pipeline.pipeline_start_ts;
    run.run_end_ts = pipeline.pipeline_end_ts;
    run.git_commit_ts = Some(pipeline.pipeline_submission_ts);
    run.device_ip = str_field(report, "device_ip");
    run.ml_model_name = str_field(report, "model").unwrap_or_default();
    run.ml_model_type = str_field(report, "model_type");
    run.num_layers = int_field(report, "num_layers");
    run.batch_size = int_field(report, "batch_size");
    run.config_params = attributes(report.get("config"));
    run.device_info = attributes(report.get("device_info"));
    run.precision = str_field(report, "precision");
    run.dataset_name = str_field(report, "dataset_name");
    run.profiler_name = str_field(report, "profile_name");
    run.input_sequence_length = int_field(report, "input_sequence_length");
    run.output_sequence_length = int_field(report, "output_sequence_length");
    run.image_dimension = str_field(report, "image_dimension");
    run.perf_analysis = report.get("perf_analysis").and_then(Value::as_bool);
    run.training = Some(report.get("training").and_then(Value::as_bool).unwrap_or(false));
    if let Some(hostname) = str_field(report, "device_hostname") {
        run.device_hostname = hostname;
    }
    run.measurements = measurements;

    failures.validated(source, run)
}

fn measurement(entry: &Value, job: &Job) -> Result<BenchmarkMeasurement, ValidationError> {
    const RECORD: &str = "BenchmarkMeasurement";
    let float = |key: &str| entry.get(key).and_then(Value::as_f64);

    Ok(BenchmarkMeasurement {
        step_start_ts: job.job_start_ts,
        step_end_ts: job.job_end_ts,
        iteration: int_field(entry, "iteration").unwrap_or(1),
        step_name: str_field(entry, "step_name")
            .ok_or_else(|| ValidationError::missing(RECORD, "step_name"))?,
        step_warm_up_num_iterations: int_field(entry, "step_warm_up_num_iterations"),
        name: str_field(entry, "measurement_name")
            .ok_or_else(|| ValidationError::missing(RECORD, "name"))?,
        value: float("value").ok_or_else(|| ValidationError::missing(RECORD, "value"))?,
        target: float("target"),
        device_power: float("device_power"),
        device_temperature: float("device_temperature"),
    })
}
