pub mod builder;
pub mod junit;
pub mod literal;
pub mod parameter_support;
pub mod pytest;
pub mod tarred;
pub mod unittest;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::dispatch::ParseContext;
use crate::error::Result;
use crate::failures::Failures;
use crate::schema::{OpTest, Test};

/// A canonical record extracted from a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Test(Test),
    OpTest(OpTest),
}

/// The report formats the collector understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    Pytest,
    Unittest,
    TarredModels,
    Builder,
    ParameterSupport,
}

impl ParserKind {
    /// Candidate order used when no override applies.
    pub const DEFAULT_ORDER: [ParserKind; 4] = [
        ParserKind::Pytest,
        ParserKind::Unittest,
        ParserKind::TarredModels,
        ParserKind::ParameterSupport,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ParserKind::Pytest => "pytest",
            ParserKind::Unittest => "unittest",
            ParserKind::TarredModels => "tarred-models",
            ParserKind::Builder => "builder",
            ParserKind::ParameterSupport => "parameter-support",
        }
    }

    /// Cheap format check. Unreadable or malformed files are rejected, never an error.
    pub fn can_parse(self, path: &Path) -> bool {
        match self {
            ParserKind::Pytest => pytest::can_parse(path),
            ParserKind::Unittest => unittest::can_parse(path),
            ParserKind::TarredModels => tarred::can_parse(path),
            ParserKind::Builder => builder::can_parse(path),
            ParserKind::ParameterSupport => parameter_support::can_parse(path),
        }
    }

    /// Extracts every valid record from `path`.
    ///
    /// Malformed records are skipped and invalid ones are recorded in
    /// `failures`; an error means the file as a whole could not be read.
    pub fn parse(
        self,
        path: &Path,
        context: &ParseContext,
        failures: &mut Failures,
    ) -> Result<Vec<Record>> {
        match self {
            ParserKind::Pytest => pytest::parse(path, context, failures),
            ParserKind::Unittest => unittest::parse(path, context, failures),
            ParserKind::TarredModels => tarred::parse(path, context, failures),
            ParserKind::Builder => builder::parse(path, context, failures),
            ParserKind::ParameterSupport => parameter_support::parse(path, context, failures),
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display form of a report path for logs and failure sources.
pub(crate) fn source_name(path: &Path) -> String {
    path.display().to_string()
}
