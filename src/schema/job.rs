use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, Attributes, Test, Validate, ValidationError};

/// A CI job execution and the tests it ran.
///
/// Jobs are built from CI provider metadata; tests are attached afterwards from
/// the reports whose file name carries this job's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub github_job_id: Option<u64>,
    pub github_job_link: Option<String>,
    pub name: String,
    pub job_submission_ts: DateTime<Utc>,
    pub job_start_ts: DateTime<Utc>,
    pub job_end_ts: DateTime<Utc>,
    /// Job success independently from the test success criteria
    pub job_success: bool,
    /// Conclusion reported by the provider (e.g. "success", "failure", "cancelled")
    pub job_status: String,
    pub docker_image: Option<String>,
    pub is_build_job: bool,
    pub job_matrix_config: Option<Attributes>,
    pub host_name: Option<String>,
    pub card_type: Option<String>,
    pub os: Option<String>,
    pub location: Option<String>,
    pub failure_signature: Option<String>,
    pub failure_description: Option<String>,
    #[serde(default)]
    pub tests: Vec<Test>,
}

impl Job {
    /// Enforces `job_submission_ts <= job_start_ts` by pulling the submission
    /// time forward. Returns `true` when a correction was made.
    pub fn correct_submission_ts(&mut self) -> bool {
        if self.job_submission_ts > self.job_start_ts {
            self.job_submission_ts = self.job_start_ts;
            return true;
        }
        false
    }
}

impl Validate for Job {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Job", "name", &self.name)?;
        if self.job_submission_ts > self.job_start_ts {
            return Err(ValidationError::new(
                "Job",
                "job_submission_ts",
                "submission must not be later than start",
            ));
        }
        for test in &self.tests {
            test.validate()?;
        }
        Ok(())
    }
}

/// A CI pipeline run; root aggregate that exclusively owns its jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub github_pipeline_id: Option<u64>,
    pub github_pipeline_link: Option<String>,
    pub pipeline_submission_ts: DateTime<Utc>,
    /// Earliest start among jobs that started on or after submission
    pub pipeline_start_ts: DateTime<Utc>,
    pub pipeline_end_ts: DateTime<Utc>,
    pub name: String,
    pub project: Option<String>,
    pub trigger: Option<String>,
    pub vcs_platform: Option<String>,
    pub repository_url: String,
    pub git_branch_name: Option<String>,
    pub git_commit_hash: String,
    pub git_author: String,
    pub orchestrator: Option<String>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Pipeline {
    pub fn job(&self, job_id: u64) -> Option<&Job> {
        self.jobs.iter().find(|job| job.github_job_id == Some(job_id))
    }

    pub fn job_mut(&mut self, job_id: u64) -> Option<&mut Job> {
        self.jobs
            .iter_mut()
            .find(|job| job.github_job_id == Some(job_id))
    }
}

impl Validate for Pipeline {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Pipeline", "name", &self.name)?;
        require_non_empty("Pipeline", "git_commit_hash", &self.git_commit_hash)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 14, hour, minute, 0).unwrap()
    }

    pub fn job(id: u64, name: &str) -> Job {
        Job {
            github_job_id: Some(id),
            github_job_link: None,
            name: name.to_string(),
            job_submission_ts: ts(7, 5),
            job_start_ts: ts(7, 10),
            job_end_ts: ts(7, 20),
            job_success: true,
            job_status: "success".to_string(),
            docker_image: Some("test_image".to_string()),
            is_build_job: false,
            job_matrix_config: None,
            host_name: Some("test_host".to_string()),
            card_type: None,
            os: None,
            location: None,
            failure_signature: None,
            failure_description: None,
            tests: vec![],
        }
    }

    pub fn pipeline(project: &str, jobs: Vec<Job>) -> Pipeline {
        Pipeline {
            github_pipeline_id: Some(12345),
            github_pipeline_link: Some("http://example.com".to_string()),
            pipeline_submission_ts: ts(6, 0),
            pipeline_start_ts: ts(7, 0),
            pipeline_end_ts: ts(8, 0),
            name: "On push".to_string(),
            project: Some(project.to_string()),
            trigger: Some("push".to_string()),
            vcs_platform: Some("github".to_string()),
            repository_url: format!("https://github.com/org/{project}"),
            git_branch_name: Some("main".to_string()),
            git_commit_hash: "abc123".to_string(),
            git_author: "test_user".to_string(),
            orchestrator: Some("github_actions".to_string()),
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_correct_submission_ts() {
        let mut job = job(1, "build");
        job.job_submission_ts = ts(7, 30);
        assert!(job.validate().is_err());

        assert!(job.correct_submission_ts());
        assert_eq!(job.job_submission_ts, job.job_start_ts);
        assert!(job.validate().is_ok());
        assert!(!job.correct_submission_ts());
    }

    #[test]
    fn test_pipeline_job_lookup() {
        let pipeline = pipeline("tt-forge-fe", vec![job(1, "a"), job(2, "b")]);
        assert_eq!(pipeline.job(2).map(|j| j.name.as_str()), Some("b"));
        assert!(pipeline.job(3).is_none());
    }
}
