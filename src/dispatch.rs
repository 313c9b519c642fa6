use std::path::{Path, PathBuf};

use log::{debug, error, warn};

use crate::config::CollectConfig;
use crate::failures::Failures;
use crate::parsers::{ParserKind, Record};

/// What is known about a report besides its content.
#[derive(Debug, Clone)]
pub struct ParseContext {
    pub project: Option<String>,
    pub job_id: Option<u64>,
    pub job_name: Option<String>,
    pub branch: Option<String>,
    pub trunk_branch: String,
    pub builder_marker: String,
    /// Where archives are extracted
    pub scratch_dir: PathBuf,
    /// Classname substrings mapped to test categories, first match wins
    pub categories: Vec<String>,
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::from_config(&CollectConfig::default())
    }
}

impl ParseContext {
    pub fn from_config(config: &CollectConfig) -> Self {
        Self {
            project: None,
            job_id: None,
            job_name: None,
            branch: None,
            trunk_branch: config.trunk_branch.clone(),
            builder_marker: config.builder_marker.clone(),
            scratch_dir: config.scratch_dir(),
            categories: config.categories.clone(),
        }
    }

    /// Same context for another job of the pipeline.
    pub fn for_job(&self, job_id: u64, job_name: Option<&str>) -> Self {
        Self {
            job_id: Some(job_id),
            job_name: job_name.map(str::to_string),
            ..self.clone()
        }
    }

    pub fn category_for(&self, classname: &str) -> String {
        self.categories
            .iter()
            .find(|category| classname.contains(category.as_str()))
            .cloned()
            .unwrap_or_else(|| "other".to_string())
    }
}

/// Whether `path` should go to the builder parser ahead of the default order.
///
/// Only trunk runs of builder jobs (or builder-named reports) are routed there,
/// and only when the file actually looks like a builder report.
pub fn should_use_builder_parser(path: &Path, context: &ParseContext) -> bool {
    let is_xml = path.extension().and_then(|e| e.to_str()) == Some("xml");
    if !is_xml || context.branch.as_deref() != Some(context.trunk_branch.as_str()) {
        return false;
    }

    let marker = context.builder_marker.as_str();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let named_builder = context
        .job_name
        .as_deref()
        .is_some_and(|name| name.contains(marker))
        || file_name.contains(marker);

    named_builder && ParserKind::Builder.can_parse(path)
}

/// Parsers to try for `path`, in order.
pub fn candidate_parsers(path: &Path, context: &ParseContext) -> Vec<ParserKind> {
    let mut candidates = Vec::new();
    if should_use_builder_parser(path, context) {
        candidates.push(ParserKind::Builder);
    }
    candidates.extend(
        ParserKind::DEFAULT_ORDER
            .into_iter()
            .filter(|parser| parser.can_parse(path)),
    );
    candidates
}

/// Parses one report with the first accepting parser that succeeds.
///
/// Never fails: a report no parser accepts yields no records, and a report
/// every accepting parser fails on yields no records plus a recorded failure.
pub fn parse_file(path: &Path, context: &ParseContext, failures: &mut Failures) -> Vec<Record> {
    let candidates = candidate_parsers(path, context);
    if candidates.is_empty() {
        warn!("No parser accepts {}", path.display());
        return Vec::new();
    }

    let mut last_error = None;
    for parser in candidates {
        debug!("Parsing {} with the {parser} parser", path.display());
        match parser.parse(path, context, failures) {
            Ok(records) => return records,
            Err(e) => {
                error!("The {parser} parser failed on {}: {e}", path.display());
                last_error = Some(format!("{parser} parser: {e}"));
            }
        }
    }

    if let Some(e) = last_error {
        failures.record(path.display().to_string(), format!("no parser could read it ({e})"));
    }
    Vec::new()
}
