use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::WalkDir;

/// Report extensions collected by each phase of a batch.
pub const TEST_EXTENSIONS: &[&str] = &["xml", "json"];
pub const OPTEST_EXTENSIONS: &[&str] = &["tar"];
pub const BENCHMARK_EXTENSIONS: &[&str] = &["json"];

/// Directory holding the downloaded artifacts of a pipeline run.
pub fn artifacts_dir(outputs_dir: &Path, pipeline_id: u64) -> PathBuf {
    outputs_dir.join(pipeline_id.to_string()).join("artifacts")
}

/// Job id encoded as the token after the last underscore of the file stem,
/// e.g. `most_recent_tests_28937183.xml` -> `28937183`.
pub fn job_id_from_file_name(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let (_, token) = stem.rsplit_once('_')?;
    token.parse().ok()
}

/// Report files under `root` with one of `extensions`, grouped by job id.
///
/// Files without a numeric job id token are skipped with a warning. Paths are
/// sorted within each job.
pub fn reports_by_job(root: &Path, extensions: &[&str]) -> BTreeMap<u64, Vec<PathBuf>> {
    let mut by_job: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();

    if !root.exists() {
        warn!("Artifacts directory {} does not exist", root.display());
        return by_job;
    }

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_map(|res| res.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| extensions.contains(&ext));
        if !matches_extension {
            continue;
        }

        match job_id_from_file_name(path) {
            Some(job_id) => by_job.entry(job_id).or_default().push(path.to_path_buf()),
            None => warn!(
                "Skipping {}: file name does not end in _<job id>",
                path.display()
            ),
        }
    }

    for paths in by_job.values_mut() {
        paths.sort();
    }
    debug!(
        "Discovered reports for {} jobs under {}",
        by_job.len(),
        root.display()
    );
    by_job
}
