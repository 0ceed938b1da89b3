//! Configuration types and validation for the upload pipeline
//! Created: 2025-06-04

use std::{collections::HashMap, path::{Path, PathBuf}};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::utils::UtilityConfig;

/// Oversize thresholds for one target category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeLimits {
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

/// Bounds for the TeX-provenance scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Bytes scanned at each end of a file before the remainder is tried
    pub window_bytes: usize,
    /// Hard cap on bytes read from any one file
    pub max_scan_bytes: usize,
    /// Header comment lines inspected in PostScript
    pub ps_header_lines: usize,
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Each workspace's files live under `<workspace_root>/<id>/src`
    pub workspace_root: PathBuf,
    pub size_limits: SizeLimits,
    /// Per-category overrides of `size_limits`
    pub category_limits: HashMap<String, SizeLimits>,
    pub detector: DetectorConfig,
    /// How many archive levels are unpacked
    pub max_archive_depth: usize,
    pub parallel_classification: bool,
    pub worker_threads: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: 10 * 1024 * 1024,   // 10MB
            max_total_bytes: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_bytes: 64 * 1024,
            max_scan_bytes: 10 * 1024 * 1024,
            ps_header_lines: 200,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("filemanager"),
            size_limits: SizeLimits::default(),
            category_limits: HashMap::new(),
            detector: DetectorConfig::default(),
            max_archive_depth: 2,
            parallel_classification: true,
            worker_threads: num_cpus::get(),
        }
    }
}

impl PipelineConfig {
    /// Limits for `category`, falling back to the defaults when the category
    /// is absent or has no override.
    pub fn limits_for(&self, category: Option<&str>) -> SizeLimits {
        category
            .and_then(|c| self.category_limits.get(c))
            .copied()
            .unwrap_or(self.size_limits)
    }
}

fn check_limits(name: &str, limits: &SizeLimits) -> Result<()> {
    if limits.max_file_bytes == 0 || limits.max_total_bytes == 0 {
        return Err(Error::ConfigError(format!("{}: size limits must be positive", name)));
    }
    if limits.max_file_bytes > limits.max_total_bytes {
        return Err(Error::ConfigError(format!(
            "{}: max_file_bytes exceeds max_total_bytes",
            name
        )));
    }
    Ok(())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::ConfigError(format!("Invalid value for {}: {}", key, value)))
}

impl UtilityConfig for PipelineConfig {
    fn validate(&self) -> Result<()> {
        check_limits("size_limits", &self.size_limits)?;
        for (category, limits) in &self.category_limits {
            check_limits(category, limits)?;
        }
        if self.detector.window_bytes == 0 {
            return Err(Error::ConfigError("Detector window must be at least 1 byte".into()));
        }
        if self.detector.max_scan_bytes < self.detector.window_bytes {
            return Err(Error::ConfigError(
                "Detector scan limit is smaller than its window".into(),
            ));
        }
        if self.worker_threads == 0 {
            return Err(Error::ConfigError("worker_threads must be at least 1".into()));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<String> {
        match key {
            "workspace_root" => Some(self.workspace_root.display().to_string()),
            "max_file_bytes" => Some(self.size_limits.max_file_bytes.to_string()),
            "max_total_bytes" => Some(self.size_limits.max_total_bytes.to_string()),
            "window_bytes" => Some(self.detector.window_bytes.to_string()),
            "max_scan_bytes" => Some(self.detector.max_scan_bytes.to_string()),
            "ps_header_lines" => Some(self.detector.ps_header_lines.to_string()),
            "max_archive_depth" => Some(self.max_archive_depth.to_string()),
            "parallel_classification" => Some(self.parallel_classification.to_string()),
            "worker_threads" => Some(self.worker_threads.to_string()),
            _ => None,
        }
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        match key {
            "workspace_root" => self.workspace_root = PathBuf::from(value),
            "max_file_bytes" => self.size_limits.max_file_bytes = parse_value(key, &value)?,
            "max_total_bytes" => self.size_limits.max_total_bytes = parse_value(key, &value)?,
            "window_bytes" => self.detector.window_bytes = parse_value(key, &value)?,
            "max_scan_bytes" => self.detector.max_scan_bytes = parse_value(key, &value)?,
            "ps_header_lines" => self.detector.ps_header_lines = parse_value(key, &value)?,
            "max_archive_depth" => self.max_archive_depth = parse_value(key, &value)?,
            "parallel_classification" => self.parallel_classification = parse_value(key, &value)?,
            "worker_threads" => self.worker_threads = parse_value(key, &value)?,
            _ => return Err(Error::ConfigError(format!("Unknown key: {}", key))),
        }
        Ok(())
    }
}

/// Loads a config file, trying JSON first and YAML second.
#[instrument]
pub fn load_config_file(path: &Path) -> Result<PipelineConfig> {
    let text = std::fs::read_to_string(path)?;
    let config: PipelineConfig = match serde_json::from_str(&text) {
        Ok(config) => config,
        Err(json_err) => {
            debug!("{} is not JSON ({}), trying YAML", path.display(), json_err);
            serde_yaml::from_str(&text).map_err(|e| {
                Error::ConfigError(format!("Cannot parse {}: {}", path.display(), e))
            })?
        }
    };
    config.validate()?;
    Ok(config)
}
