use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, Attributes, Validate, ValidationError};

/// Terminal status of an operator test run by the builder flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Success,
    CompileFailed,
    GoldenFailed,
    RunFailed,
}

impl TestStatus {
    /// Maps a `failure_stage` report property to its terminal status.
    pub fn from_failure_stage(stage: &str) -> Option<Self> {
        match stage {
            "compile" => Some(Self::CompileFailed),
            "golden" => Some(Self::GoldenFailed),
            "runtime" => Some(Self::RunFailed),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

/// Execution backend an operator test was lowered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Ttnn,
    Ttmetal,
}

impl Backend {
    pub fn from_property(value: &str) -> Option<Self> {
        match value {
            "ttnn" | "ttnn-standalone" => Some(Self::Ttnn),
            "ttmetal" => Some(Self::Ttmetal),
            _ => None,
        }
    }
}

/// Description of a tensor consumed or produced by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorDesc {
    pub shape: Vec<i64>,
    /// e.g. `Float32`, `BFloat16`
    pub data_type: String,
    /// Memory space, e.g. `DRAM`, `L1`, `System`
    pub buffer_type: String,
    /// e.g. `ROW_MAJOR`, `Interleaved`, `HeightSharded`
    pub layout: String,
    /// 2D region of cores the tensor is stored on
    pub grid_shape: Vec<i64>,
}

impl TensorDesc {
    /// Tensor placed with the builder defaults: DRAM, row-major, 1x1 grid.
    pub fn with_defaults(shape: Vec<i64>, data_type: impl Into<String>) -> Self {
        Self {
            shape,
            data_type: data_type.into(),
            buffer_type: "DRAM".to_string(),
            layout: "ROW_MAJOR".to_string(),
            grid_shape: vec![1, 1],
        }
    }
}

impl Validate for TensorDesc {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("TensorDesc", "data_type", &self.data_type)?;
        if self.grid_shape.len() != 2 {
            return Err(ValidationError::new(
                "TensorDesc",
                "grid_shape",
                format!("expected 2 dimensions, got {}", self.grid_shape.len()),
            ));
        }
        Ok(())
    }
}

/// One ML operator-level compilation/execution test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpTest {
    pub github_job_id: u64,
    pub full_test_name: String,
    pub test_start_ts: DateTime<Utc>,
    pub test_end_ts: DateTime<Utc>,
    pub test_case_name: String,
    pub filepath: String,
    pub success: bool,
    pub skipped: bool,
    pub error_message: Option<String>,
    pub config: Option<Attributes>,
    pub frontend: String,
    pub model_name: String,
    pub op_kind: String,
    pub op_name: String,
    pub framework_op_name: String,
    pub inputs: Vec<TensorDesc>,
    pub outputs: Vec<TensorDesc>,
    pub op_params: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,
}

impl Validate for OpTest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("OpTest", "full_test_name", &self.full_test_name)?;
        require_non_empty("OpTest", "test_case_name", &self.test_case_name)?;
        for tensor in self.inputs.iter().chain(&self.outputs) {
            tensor.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_stage_mapping() {
        assert_eq!(
            TestStatus::from_failure_stage("compile"),
            Some(TestStatus::CompileFailed)
        );
        assert_eq!(
            TestStatus::from_failure_stage("golden"),
            Some(TestStatus::GoldenFailed)
        );
        assert_eq!(
            TestStatus::from_failure_stage("runtime"),
            Some(TestStatus::RunFailed)
        );
        assert_eq!(
            TestStatus::from_failure_stage("success"),
            Some(TestStatus::Success)
        );
        assert_eq!(TestStatus::from_failure_stage("linking"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&TestStatus::CompileFailed).unwrap();
        assert_eq!(json, "\"compile_failed\"");
    }

    #[test]
    fn test_backend_aliases() {
        assert_eq!(Backend::from_property("ttnn-standalone"), Some(Backend::Ttnn));
        assert_eq!(Backend::from_property("ttmetal"), Some(Backend::Ttmetal));
        assert_eq!(Backend::from_property("cuda"), None);
    }

    #[test]
    fn test_tensor_grid_must_be_2d() {
        let mut tensor = TensorDesc::with_defaults(vec![32, 32], "bf16");
        assert!(tensor.validate().is_ok());
        tensor.grid_shape = vec![1];
        assert_eq!(tensor.validate().unwrap_err().field, "grid_shape");
    }
}
