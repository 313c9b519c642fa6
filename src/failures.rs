use std::fmt;

use log::error;

use crate::schema::Validate;

/// A record that failed validation, or a report no parser could read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// File or report the record came from
    pub source: String,
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Accumulates validation and parse failures across a whole batch.
///
/// Parsers and mappers skip invalid records locally and keep going; the batch
/// driver reads [`Failures::has_failures`] once at the end to decide the exit
/// status, so dropped data still surfaces.
#[derive(Debug, Default)]
pub struct Failures {
    entries: Vec<Failure>,
}

impl Failures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and records a failure.
    pub fn record(&mut self, source: impl Into<String>, message: impl fmt::Display) {
        let failure = Failure {
            source: source.into(),
            message: message.to_string(),
        };
        error!("Recorded failure in {failure}");
        self.entries.push(failure);
    }

    /// Passes `record` through when valid; otherwise records the violation and drops it.
    pub fn validated<T: Validate>(&mut self, source: &str, record: T) -> Option<T> {
        match record.validate() {
            Ok(()) => Some(record),
            Err(e) => {
                self.record(source, e);
                None
            }
        }
    }

    pub fn has_failures(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Failure] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_accumulator_has_no_failures() {
        let failures = Failures::new();
        assert!(!failures.has_failures());
        assert_eq!(failures.len(), 0);
    }

    #[test]
    fn test_validated_drops_invalid_records() {
        let start = chrono::Utc::now();
        let mut failures = Failures::new();

        let valid = crate::schema::test_fixtures::test_named("test_ok", start);
        assert!(failures.validated("report.xml", valid).is_some());
        assert!(!failures.has_failures());

        let mut invalid = crate::schema::test_fixtures::test_named("test_bad", start);
        invalid.category = String::new();
        assert!(failures.validated("report.xml", invalid).is_none());
        assert_eq!(
            failures.entries()[0].to_string(),
            "report.xml: Test.category: must not be empty"
        );
    }

    #[test]
    fn test_record_keeps_source_and_order() {
        let mut failures = Failures::new();
        failures.record("report_1.xml", "Test.category: must not be empty");
        failures.record("perf_2.json", "CompleteBenchmarkRun.ml_model_name: field required");

        assert!(failures.has_failures());
        assert_eq!(failures.len(), 2);
        assert_eq!(failures.entries()[0].source, "report_1.xml");
        assert_eq!(
            failures.entries()[1].to_string(),
            "perf_2.json: CompleteBenchmarkRun.ml_model_name: field required"
        );
    }
}
