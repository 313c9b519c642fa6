//! Pipeline and job records from downloaded GitHub Actions metadata.
//!
//! `workflow.json` is a workflow run object and `workflow_jobs.json` is the
//! `{"jobs": [...]}` listing of that run, both as returned by the REST API.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CollectError, Result};
use crate::schema::{Job, Pipeline};

pub const WORKFLOW_FILE: &str = "workflow.json";
pub const WORKFLOW_JOBS_FILE: &str = "workflow_jobs.json";

const GITHUB_RUNNER_PREFIX: &str = "GitHub Actions ";
const CARD_TYPES: [&str; 4] = ["E150", "N150", "N300", "BH"];

/// GitHub Actions workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubWorkflowRun {
    /// Unique identifier for the workflow run
    pub id: u64,
    /// Name of the workflow
    pub name: Option<String>,
    /// Head branch or tag name
    pub head_branch: Option<String>,
    /// SHA of the head commit
    pub head_sha: String,
    pub html_url: Option<String>,
    /// When the run was created
    pub created_at: DateTime<Utc>,
    /// When the run was updated
    pub updated_at: DateTime<Utc>,
    pub head_commit: Option<GitHubCommit>,
    pub repository: GitHubRepository,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubCommit {
    pub author: Option<GitHubAuthor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAuthor {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub name: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubJobs {
    pub jobs: Vec<GitHubJob>,
}

/// Job within a GitHub Actions workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubJob {
    /// Unique identifier for the job
    pub id: u64,
    /// Name of the job
    pub name: String,
    pub html_url: Option<String>,
    /// Status of the job
    pub status: String,
    /// Conclusion of the job
    pub conclusion: Option<String>,
    /// When the job was queued
    pub created_at: Option<DateTime<Utc>>,
    /// When the job started
    pub started_at: Option<DateTime<Utc>>,
    /// When the job completed
    pub completed_at: Option<DateTime<Utc>>,
    /// Steps in this job
    #[serde(default)]
    pub steps: Vec<GitHubStep>,
    /// Labels for the runner
    #[serde(default)]
    pub labels: Vec<String>,
    pub runner_name: Option<String>,
}

/// Step within a GitHub Actions job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubStep {
    /// Name of the step
    pub name: String,
    /// Status of the step
    pub status: String,
    /// Conclusion of the step
    pub conclusion: Option<String>,
    /// Step number
    pub number: u32,
}

/// Reads the workflow run and its jobs from `run_dir`.
pub fn load_workflow(run_dir: &Path) -> Result<(GitHubWorkflowRun, Vec<GitHubJob>)> {
    let run: GitHubWorkflowRun =
        serde_json::from_str(&fs::read_to_string(run_dir.join(WORKFLOW_FILE))?)?;
    let jobs: GitHubJobs =
        serde_json::from_str(&fs::read_to_string(run_dir.join(WORKFLOW_JOBS_FILE))?)?;
    debug!("Loaded workflow run {} with {} jobs", run.id, jobs.jobs.len());
    Ok((run, jobs.jobs))
}

/// Trigger recorded on the pipeline: the configured value, else
/// `GITHUB_EVENT_NAME`, else `test`.
pub fn resolve_trigger(configured: Option<&str>) -> String {
    configured
        .map(str::to_string)
        .or_else(|| std::env::var("GITHUB_EVENT_NAME").ok())
        .unwrap_or_else(|| "test".to_string())
}

/// Builds the pipeline record.
///
/// Jobs that started before the run was submitted are retries left over from an
/// earlier attempt and are dropped. The pipeline starts with its earliest
/// remaining job; a run without one is an error.
pub fn pipeline_from_github(
    run: &GitHubWorkflowRun,
    github_jobs: &[GitHubJob],
    trigger: String,
) -> Result<Pipeline> {
    let submission = run.created_at;

    let jobs: Vec<Job> = github_jobs
        .iter()
        .filter_map(job_from_github)
        .filter(|job| {
            let eligible = job.job_start_ts >= submission;
            if !eligible {
                info!(
                    "Dropping job {} which started before pipeline submission",
                    job.name
                );
            }
            eligible
        })
        .collect();

    let start = jobs
        .iter()
        .map(|job| job.job_start_ts)
        .min()
        .ok_or_else(|| {
            CollectError::Parse(format!(
                "workflow run {} has no job that started after submission",
                run.id
            ))
        })?;

    Ok(Pipeline {
        github_pipeline_id: Some(run.id),
        github_pipeline_link: run.html_url.clone(),
        pipeline_submission_ts: submission,
        pipeline_start_ts: start,
        pipeline_end_ts: run.updated_at,
        name: run.name.clone().unwrap_or_default(),
        project: Some(run.repository.name.clone()),
        trigger: Some(trigger),
        vcs_platform: Some("github".to_string()),
        repository_url: run.repository.html_url.clone(),
        git_branch_name: run.head_branch.clone(),
        git_commit_hash: run.head_sha.clone(),
        git_author: run
            .head_commit
            .as_ref()
            .and_then(|commit| commit.author.as_ref())
            .and_then(|author| author.name.clone())
            .unwrap_or_default(),
        orchestrator: Some("github_actions".to_string()),
        jobs,
    })
}

/// Builds a job record. Jobs that have not completed are skipped.
pub fn job_from_github(github_job: &GitHubJob) -> Option<Job> {
    if github_job.status != "completed" {
        warn!(
            "Skipping job {} ({}) with status {}",
            github_job.name, github_job.id, github_job.status
        );
        return None;
    }

    let Some(started) = github_job.started_at.or(github_job.created_at) else {
        warn!("Skipping job {} without timestamps", github_job.name);
        return None;
    };
    let submission = github_job.created_at.unwrap_or(started);
    let conclusion = github_job.conclusion.as_deref();
    let start = if conclusion == Some("skipped") {
        submission
    } else {
        started
    };
    let location = github_job.runner_name.as_deref().map(location);

    let mut job = Job {
        github_job_id: Some(github_job.id),
        github_job_link: github_job.html_url.clone(),
        name: github_job.name.clone(),
        job_submission_ts: submission,
        job_start_ts: start,
        job_end_ts: github_job.completed_at.unwrap_or(start).max(start),
        job_success: conclusion == Some("success"),
        job_status: conclusion.unwrap_or("unknown").to_string(),
        docker_image: None,
        is_build_job: github_job.name.contains("build")
            || github_job.labels.iter().any(|label| label == "build"),
        job_matrix_config: None,
        host_name: github_job.runner_name.clone(),
        card_type: github_job.runner_name.as_deref().and_then(card_type),
        os: location.and_then(|location| os(location, &github_job.labels)),
        location: location.map(str::to_string),
        failure_signature: failure_signature(github_job),
        failure_description: None,
        tests: Vec::new(),
    };
    if job.correct_submission_ts() {
        debug!("Corrected submission time of job {}", job.name);
    }
    Some(job)
}

fn location(runner_name: &str) -> &'static str {
    if runner_name.contains(GITHUB_RUNNER_PREFIX) {
        "github"
    } else {
        "tt_cloud"
    }
}

fn os(location: &str, labels: &[String]) -> Option<String> {
    if location == "tt_cloud" {
        return Some("ubuntu-20.04".to_string());
    }
    labels
        .iter()
        .find(|label| ["ubuntu", "windows", "macos"].iter().any(|os| label.contains(os)))
        .map(|label| match label.as_str() {
            "ubuntu-latest" => "ubuntu-24.04".to_string(),
            other => other.to_string(),
        })
}

fn card_type(runner_name: &str) -> Option<String> {
    let upper = runner_name.to_uppercase();
    CARD_TYPES
        .iter()
        .find(|card| upper.contains(*card))
        .map(|card| card.to_string())
}

/// Name of the first failed step of a failed job.
fn failure_signature(job: &GitHubJob) -> Option<String> {
    if job.conclusion.as_deref() != Some("failure") {
        return None;
    }
    job.steps
        .iter()
        .find(|step| step.status == "completed" && step.conclusion.as_deref() == Some("failure"))
        .map(|step| step.name.clone())
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 14, hour, minute, 0).unwrap()
    }

    fn load() -> (GitHubWorkflowRun, Vec<GitHubJob>) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(WORKFLOW_FILE), WORKFLOW).unwrap();
        fs::write(dir.path().join(WORKFLOW_JOBS_FILE), WORKFLOW_JOBS).unwrap();
        load_workflow(dir.path()).unwrap()
    }

    #[test]
    fn test_pipeline_from_github() {
        let (run, jobs) = load();
        let pipeline = pipeline_from_github(&run, &jobs, "push".to_string()).unwrap();

        assert_eq!(pipeline.github_pipeline_id, Some(900));
        assert_eq!(pipeline.project.as_deref(), Some("tt-metal"));
        assert_eq!(pipeline.git_author, "Jane Doe");
        assert_eq!(pipeline.trigger.as_deref(), Some("push"));
        assert_eq!(pipeline.pipeline_submission_ts, ts(7, 0));
        assert_eq!(pipeline.pipeline_start_ts, ts(7, 2));
        assert_eq!(pipeline.pipeline_end_ts, ts(8, 0));

        let ids: Vec<_> = pipeline.jobs.iter().filter_map(|j| j.github_job_id).collect();
        assert_eq!(ids, vec![7, 8]);
    }

    #[test]
    fn test_job_metadata_inference() {
        let (run, jobs) = load();
        let pipeline = pipeline_from_github(&run, &jobs, "push".to_string()).unwrap();

        let build = pipeline.job(7).unwrap();
        assert!(build.is_build_job);
        assert!(build.job_success);
        assert_eq!(build.location.as_deref(), Some("github"));
        assert_eq!(build.os.as_deref(), Some("ubuntu-24.04"));
        assert_eq!(build.card_type, None);

        let tests = pipeline.job(8).unwrap();
        assert!(!tests.is_build_job);
        assert_eq!(tests.job_status, "failure");
        assert_eq!(tests.location.as_deref(), Some("tt_cloud"));
        assert_eq!(tests.os.as_deref(), Some("ubuntu-20.04"));
        assert_eq!(tests.card_type.as_deref(), Some("N300"));
        assert_eq!(tests.failure_signature.as_deref(), Some("Run tests"));
        // Queued after it started: submission is pulled back to start.
        assert_eq!(tests.job_submission_ts, ts(7, 5));
    }

    #[test]
    fn test_skipped_job_starts_at_submission() {
        let (_, jobs) = load();
        let mut skipped = jobs[0].clone();
        skipped.conclusion = Some("skipped".to_string());
        let job = job_from_github(&skipped).unwrap();
        assert_eq!(job.job_start_ts, ts(7, 1));
        assert_eq!(job.job_submission_ts, ts(7, 1));
        assert_eq!(job.job_status, "skipped");
    }

    #[test]
    fn test_pipeline_without_eligible_jobs_is_an_error() {
        let (run, jobs) = load();
        let stale: Vec<_> = jobs.into_iter().filter(|j| j.id == 9).collect();
        assert!(pipeline_from_github(&run, &stale, "push".to_string()).is_err());
    }

    #[test]
    fn test_resolve_trigger_prefers_configured_value() {
        assert_eq!(resolve_trigger(Some("schedule")), "schedule");
    }

    #[test]
    fn test_card_type() {
        assert_eq!(card_type("tt-e150-runner"), Some("E150".to_string()));
        assert_eq!(card_type("bh-lb-02"), Some("BH".to_string()));
        assert_eq!(card_type("GitHub Actions 3"), None);
    }
}
