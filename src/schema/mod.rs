//! Canonical record shapes produced from CI artifacts.
//!
//! Every record implements [`Validate`]. Parsers and mappers validate a record
//! before handing it out; a record that fails is dropped and the failure is
//! recorded in the batch's [`crate::failures::Failures`].

mod benchmark;
mod job;
mod optest;
mod test;

use std::fmt;

pub use benchmark::{BenchmarkMeasurement, CompleteBenchmarkRun};
pub use job::{Job, Pipeline};
pub use optest::{Backend, OpTest, TensorDesc, TestStatus};
pub use test::Test;

#[cfg(test)]
pub(crate) use job::fixtures as job_fixtures;
#[cfg(test)]
pub(crate) use test::fixtures as test_fixtures;

/// Free-form key/value mapping attached to tests (`config`, `tags`, `op_params`).
pub type Attributes = indexmap::IndexMap<String, serde_json::Value>;

/// A field-level constraint violated by a canonical record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub record: &'static str,
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(record: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            record,
            field,
            reason: reason.into(),
        }
    }

    pub fn missing(record: &'static str, field: &'static str) -> Self {
        Self::new(record, field, "field required")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}: {}", self.record, self.field, self.reason)
    }
}

impl std::error::Error for ValidationError {}

/// Field constraints of a canonical record.
pub trait Validate {
    /// Checks every field constraint, returning the first violation.
    fn validate(&self) -> Result<(), ValidationError>;
}

pub(crate) fn require_non_empty(
    record: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(record, field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_finite(
    record: &'static str,
    field: &'static str,
    value: Option<f64>,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.is_finite() => Err(ValidationError::new(
            record,
            field,
            format!("must be a finite number, got {v}"),
        )),
        _ => Ok(()),
    }
}
