use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{require_non_empty, Attributes, Validate, ValidationError};

/// One pytest/unittest test-case execution, owned by a [`super::Job`].
///
/// Identity within a job is `(full_test_name, test_start_ts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test {
    /// When the test execution started
    pub test_start_ts: DateTime<Utc>,
    /// When the test execution ended
    pub test_end_ts: DateTime<Utc>,
    /// Name of the test function, without parametrization
    pub test_case_name: String,
    /// Test file path and name
    pub filepath: String,
    /// Name of the test category
    pub category: String,
    pub group: Option<String>,
    pub owner: Option<String>,
    /// Frontend or framework used to run the test
    pub frontend: Option<String>,
    /// Model from which the tested op appears
    pub model_name: Option<String>,
    /// Operation name (e.g. `ttnn.conv2d`)
    pub op_name: Option<String>,
    /// Operation name within the framework (e.g. `torch.conv2d`)
    pub framework_op_name: Option<String>,
    /// Operation kind (e.g. `Eltwise`)
    pub op_kind: Option<String>,
    /// Succinct error string, such as the exception type
    pub error_message: Option<String>,
    pub success: bool,
    pub skipped: bool,
    /// `filepath::test name` including parametrization
    pub full_test_name: String,
    pub config: Option<Attributes>,
    pub tags: Option<Attributes>,
}

impl Validate for Test {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("Test", "test_case_name", &self.test_case_name)?;
        require_non_empty("Test", "category", &self.category)?;
        require_non_empty("Test", "full_test_name", &self.full_test_name)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn test_named(name: &str, start: DateTime<Utc>) -> Test {
        Test {
            test_start_ts: start,
            test_end_ts: start,
            test_case_name: name.to_string(),
            filepath: "tests/test_file.py".to_string(),
            category: "other".to_string(),
            group: None,
            owner: None,
            frontend: None,
            model_name: None,
            op_name: None,
            framework_op_name: None,
            op_kind: None,
            error_message: None,
            success: true,
            skipped: false,
            full_test_name: format!("tests/test_file.py::{name}"),
            config: None,
            tags: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::test_named;
    use super::*;

    #[test]
    fn test_valid_test_passes() {
        assert!(test_named("test_add", Utc::now()).validate().is_ok());
    }

    #[test]
    fn test_empty_filepath_is_allowed() {
        let mut test = test_named("test_add", Utc::now());
        test.filepath = String::new();
        assert!(test.validate().is_ok());
    }

    #[test]
    fn test_empty_full_name_is_rejected() {
        let mut test = test_named("test_add", Utc::now());
        test.full_test_name = String::new();
        let err = test.validate().unwrap_err();
        assert_eq!(err.field, "full_test_name");
    }

    #[test]
    fn test_serializes_missing_fields_as_null() {
        let test = test_named("test_add", Utc::now());
        let json = serde_json::to_value(&test).unwrap();
        assert!(json["group"].is_null());
        assert!(json["config"].is_null());
        assert_eq!(json["full_test_name"], "tests/test_file.py::test_add");
    }
}
