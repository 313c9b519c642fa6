use log::warn;
use serde_json::{Map, Value};

use super::{
    attributes, base_run, derive_model_type, int_field, job_measurement, normalize_model_name,
    str_field,
};
use crate::failures::Failures;
use crate::parsers::parameter_support::{Outcome, ParameterSupportReport};
use crate::schema::{Attributes, CompleteBenchmarkRun, Job, Pipeline};

/// Numeric fields of a `benchmarks` entry kept as measurements, in output order.
const BENCHMARK_MEASUREMENTS: &[&str] = &[
    "mean_ttft_ms",
    "std_ttft_ms",
    "median_ttft_ms",
    "p99_ttft_ms",
    "mean_tpot_ms",
    "std_tpot_ms",
    "median_tpot_ms",
    "p99_tpot_ms",
    "mean_itl_ms",
    "std_itl_ms",
    "median_itl_ms",
    "p99_itl_ms",
    "mean_e2el_ms",
    "median_e2el_ms",
    "p99_e2el_ms",
    "mean_tps",
    "tps_decode_throughput",
    "tps_prefill_throughput",
    "request_throughput",
    "output_token_throughput",
    "total_token_throughput",
];

/// Numeric fields of an `evals` entry kept as measurements, in output order.
const EVAL_MEASUREMENTS: &[&str] = &[
    "score",
    "published_score",
    "gpu_reference_score",
    "ratio_to_published",
    "ratio_to_reference",
];

/// Non-measurement entry fields carried into `config_params`.
const CONFIG_FIELDS: &[&str] = &["max_concurrency", "num_requests", "num_prompts", "tolerance"];

/// Maps a multi-run report: one run per `benchmarks` and `evals` entry and one
/// per `parameter_support_tests` group.
pub(super) fn map(
    report: &Value,
    pipeline: &Pipeline,
    job: &Job,
    source: &str,
    failures: &mut Failures,
) -> Vec<CompleteBenchmarkRun> {
    let empty = Map::new();
    let metadata = report
        .get("metadata")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let entries = |key: &str| {
        report
            .get(key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    };

    let mut runs = Vec::new();
    for entry in entries("benchmarks") {
        runs.push(entry_run(
            &entry, metadata, "benchmark", BENCHMARK_MEASUREMENTS, pipeline, job,
        ));
    }
    for entry in entries("evals") {
        let mut run = entry_run(&entry, metadata, "eval", EVAL_MEASUREMENTS, pipeline, job);
        run.dataset_name = str_field(&entry, "task_name");
        runs.push(run);
    }
    if report.get("parameter_support_tests").is_some() {
        match serde_json::from_value::<ParameterSupportReport>(report.clone()) {
            Ok(parameter_support) => {
                runs.extend(parameter_support_runs(&parameter_support, pipeline, job));
            }
            Err(e) => warn!("Ignoring malformed parameter_support_tests in {source}: {e}"),
        }
    }

    runs.into_iter()
        .filter_map(|run| failures.validated(source, run))
        .collect()
}

/// Metadata fields win over the entry's own.
fn lookup<'a>(metadata: &'a Map<String, Value>, entry: &'a Value, key: &str) -> Option<&'a Value> {
    metadata
        .get(key)
        .filter(|value| !value.is_null())
        .or_else(|| entry.get(key).filter(|value| !value.is_null()))
}

fn entry_run(
    entry: &Value,
    metadata: &Map<String, Value>,
    run_type: &str,
    whitelist: &[&str],
    pipeline: &Pipeline,
    job: &Job,
) -> CompleteBenchmarkRun {
    let text = |key: &str| lookup(metadata, entry, key).and_then(Value::as_str);

    let model = text("model_name")
        .or_else(|| text("model_id"))
        .or_else(|| text("model"));

    let mut run = base_run(pipeline, job, run_type);
    run.ml_model_name = normalize_model_name(model).unwrap_or_default();
    run.ml_model_type = derive_model_type(metadata)
        .or_else(|| entry.as_object().and_then(derive_model_type));
    run.device_info = text("device").map(device_info);
    run.batch_size = int_field(entry, "batch_size");
    run.input_sequence_length = int_field(entry, "input_sequence_length");
    run.output_sequence_length = int_field(entry, "output_sequence_length");
    run.config_params = Some(
        CONFIG_FIELDS
            .iter()
            .filter_map(|key| entry.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect::<Attributes>(),
    )
    .filter(|params| !params.is_empty());
    run.measurements = whitelist
        .iter()
        .filter_map(|name| {
            let value = entry.get(*name).and_then(Value::as_f64)?;
            Some(job_measurement(job, run_type, name, value))
        })
        .collect();
    run
}

fn parameter_support_runs(
    report: &ParameterSupportReport,
    pipeline: &Pipeline,
    job: &Job,
) -> Vec<CompleteBenchmarkRun> {
    let model_name = report.model_name();
    let device = report.device();

    report
        .parameter_support_tests
        .results
        .iter()
        .map(|(group, outcomes)| {
            let count = |wanted: Outcome| {
                outcomes
                    .iter()
                    .filter(|o| Outcome::from_status(o.get("status").and_then(Value::as_str)) == wanted)
                    .count()
            };
            let passed = count(Outcome::Pass);
            let failed = count(Outcome::Fail);
            let skipped = count(Outcome::Skip);
            let pass_rate = if outcomes.is_empty() {
                0.0
            } else {
                passed as f64 / outcomes.len() as f64 * 100.0
            };

            let mut run = base_run(pipeline, job, "parameter_support_test");
            run.ml_model_name = normalize_model_name(Some(&model_name)).unwrap_or_default();
            run.device_info = Some(device_info(&device));
            run.config_params = attributes(Some(&serde_json::json!({
                "group": group,
                "model_impl": report.model_impl(),
                "endpoint_url": report.endpoint_url(),
            })));
            run.measurements = [
                ("num_passed", passed as f64),
                ("num_failed", failed as f64),
                ("num_skipped", skipped as f64),
                ("pass_rate", pass_rate),
            ]
            .into_iter()
            .map(|(name, value)| job_measurement(job, group, name, value))
            .collect();
            run
        })
        .collect()
}

fn device_info(device: &str) -> Attributes {
    [("device".to_string(), Value::String(device.to_string()))]
        .into_iter()
        .collect()
}
