use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CollectError;

/// Configuration file structure for cicollect.
///
/// Holds the conventions of the CI being collected (trunk branch, builder job
/// marker, test categories) and output preferences. Configuration files are
/// loaded from the current directory or a specified path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Report parsing conventions
    #[serde(default)]
    pub collect: CollectConfig,

    /// Output preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CollectConfig {
    /// Branch on which builder reports are routed to the builder parser
    #[serde(default = "default_trunk_branch")]
    pub trunk_branch: String,

    /// Substring identifying builder jobs and reports
    #[serde(default = "default_builder_marker")]
    pub builder_marker: String,

    /// Directory archives are extracted into (defaults to the system temp dir)
    pub scratch_dir: Option<PathBuf>,

    /// Ordered classname substrings used as test categories
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Pipeline trigger, overriding `GITHUB_EVENT_NAME`
    pub event_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory output documents are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            trunk_branch: default_trunk_branch(),
            builder_marker: default_builder_marker(),
            scratch_dir: None,
            categories: default_categories(),
            event_name: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            pretty: false,
        }
    }
}

fn default_trunk_branch() -> String {
    "main".to_string()
}

fn default_builder_marker() -> String {
    "builder".to_string()
}

fn default_categories() -> Vec<String> {
    ["models", "ttnn", "tt_eager", "tt_metal"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl CollectConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("cicollect"))
    }
}

const CANDIDATES: [&str; 4] = [
    "cicollect.toml",
    "cicollect.json",
    "cicollect.yaml",
    "cicollect.yml",
];

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cicollect.toml
    /// 3. ./cicollect.json
    /// 4. ./cicollect.yaml
    /// 5. ./cicollect.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_in(path, Path::new("."))
    }

    fn load_in(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        for candidate in CANDIDATES {
            let path = dir.join(candidate);
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }?;

        config
            .checked()
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Branch and marker must be non-empty; an empty category would match
    /// every classname.
    fn checked(self) -> crate::error::Result<Self> {
        let collect = &self.collect;
        if collect.trunk_branch.trim().is_empty() {
            return Err(CollectError::Config("trunk-branch must not be empty".to_string()));
        }
        if collect.builder_marker.trim().is_empty() {
            return Err(CollectError::Config("builder-marker must not be empty".to_string()));
        }
        if collect.categories.iter().any(|category| category.is_empty()) {
            return Err(CollectError::Config("categories must not contain empty names".to_string()));
        }
        Ok(self)
    }
}
