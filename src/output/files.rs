use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::error::Result;
use crate::schema::{CompleteBenchmarkRun, OpTest, Pipeline};
use crate::timestamp::data_pipeline_format;

pub fn pipeline_file_name(pipeline: &Pipeline) -> String {
    format!(
        "pipeline_{}_{}.json",
        pipeline.github_pipeline_id.unwrap_or_default(),
        data_pipeline_format(&pipeline.pipeline_start_ts)
    )
}

pub fn benchmark_file_name(run: &CompleteBenchmarkRun) -> String {
    format!(
        "benchmark_{}_{}.json",
        run.github_job_id.unwrap_or_default(),
        data_pipeline_format(&run.run_start_ts)
    )
}

pub fn op_tests_file_name(job_id: u64, pipeline_start: &DateTime<Utc>) -> String {
    format!(
        "github_job_{job_id}_{}.json",
        data_pipeline_format(pipeline_start)
    )
}

/// Writes canonical records as JSON documents under one directory.
pub struct OutputWriter {
    dir: PathBuf,
    pretty: bool,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, pretty: bool) -> Self {
        Self {
            dir: dir.into(),
            pretty,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize + ?Sized>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        let path = self.dir.join(file_name);
        fs::write(&path, json)?;
        info!("Wrote {}", path.display());
        Ok(path)
    }

    pub fn write_pipeline(&self, pipeline: &Pipeline) -> Result<PathBuf> {
        self.write(&pipeline_file_name(pipeline), pipeline)
    }

    /// One document per run. Runs of the same job share a start time, so later
    /// runs with a taken name get a numeric suffix.
    pub fn write_benchmark_runs(&self, runs: &[CompleteBenchmarkRun]) -> Result<Vec<PathBuf>> {
        let mut taken = HashSet::new();
        let mut paths = Vec::with_capacity(runs.len());

        for run in runs {
            let base = benchmark_file_name(run);
            let mut name = base.clone();
            let mut suffix = 1;
            while !taken.insert(name.clone()) {
                name = format!("{}_{suffix}.json", base.trim_end_matches(".json"));
                suffix += 1;
            }
            paths.push(self.write(&name, run)?);
        }
        Ok(paths)
    }

    pub fn write_op_tests(
        &self,
        job_id: u64,
        pipeline_start: &DateTime<Utc>,
        op_tests: &[OpTest],
    ) -> Result<PathBuf> {
        self.write(&op_tests_file_name(job_id, pipeline_start), op_tests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::job_fixtures::{job, pipeline, ts};
    use crate::schema::Attributes;
    use serde_json::Value;
    use tempfile::TempDir;

    fn run(job_id: u64) -> CompleteBenchmarkRun {
        CompleteBenchmarkRun {
            run_start_ts: ts(7, 10),
            run_end_ts: ts(7, 20),
            run_type: "benchmark".to_string(),
            git_repo_name: None,
            git_commit_hash: None,
            git_commit_ts: None,
            git_branch_name: None,
            github_pipeline_id: Some(12345),
            github_pipeline_link: None,
            github_job_id: Some(job_id),
            user_name: None,
            docker_image: None,
            device_hostname: "test_host".to_string(),
            device_ip: None,
            device_info: Some(Attributes::new()),
            ml_model_name: "Llama-3.2-1B".to_string(),
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

    #[test]
    fn test_file_names() {
        let pipeline = pipeline("tt-metal", vec![]);
        assert_eq!(
            pipeline_file_name(&pipeline),
            "pipeline_12345_2025-04-14T07:00:00.000000+0000.json"
        );
        assert_eq!(
            benchmark_file_name(&run(8)),
            "benchmark_8_2025-04-14T07:10:00.000000+0000.json"
        );
        assert_eq!(
            op_tests_file_name(8, &ts(7, 0)),
            "github_job_8_2025-04-14T07:00:00.000000+0000.json"
        );
    }

    #[test]
    fn test_write_pipeline() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path().join("out"), false);
        let pipeline = pipeline("tt-metal", vec![job(8, "build")]);

        let path = writer.write_pipeline(&pipeline).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains('\n'));
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["jobs"][0]["github_job_id"], 8);
        assert_eq!(value["pipeline_start_ts"], "2025-04-14T07:00:00Z");
    }

    #[test]
    fn test_benchmark_runs_of_one_job_get_distinct_files() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path(), true);

        let paths = writer
            .write_benchmark_runs(&[run(8), run(8), run(9)])
            .unwrap();

        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "benchmark_8_2025-04-14T07:10:00.000000+0000.json",
                "benchmark_8_2025-04-14T07:10:00.000000+0000_1.json",
                "benchmark_9_2025-04-14T07:10:00.000000+0000.json",
            ]
        );
        assert!(fs::read_to_string(&paths[0]).unwrap().contains('\n'));
    }
}
