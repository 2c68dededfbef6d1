//! Run configuration: TOML file with defaults, overridden by the CLI.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Names of the tabular columns the pipeline relies on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnNames {
    pub subject: String,
    pub scan_number: String,
    pub project: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            subject: "PATIENT_ID".to_string(),
            scan_number: "SCAN_NUM".to_string(),
            project: "PROJECT".to_string(),
        }
    }
}

/// How many discovered scans of one subject get ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiScanPolicy {
    /// Only the first discovered file per subject.
    #[default]
    First,
    /// Every discovered file of a selected subject.
    All,
}

/// What a scan-loading or slice-extraction failure does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectErrorPolicy {
    #[default]
    Abort,
    /// Log the subject, record it in the report, keep going.
    Skip,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PrepConfig {
    /// Root of the raw scan tree.
    pub source_root: PathBuf,
    /// Output root with one directory per subject.
    pub dataset_root: PathBuf,
    /// Tabular metadata file (`.csv`, or `.json` records).
    pub tabular_path: PathBuf,
    /// Scan file extension without the dot.
    pub extension: String,
    pub scan_number: i64,
    pub project: String,
    pub columns: ColumnNames,
    pub multi_scan: MultiScanPolicy,
    pub subject_errors: SubjectErrorPolicy,
}

impl Default for PrepConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("../AIBL"),
            dataset_root: PathBuf::from("../data/mri_images"),
            tabular_path: PathBuf::from("../data/tabular_data.csv"),
            extension: "nii".to_string(),
            scan_number: 1,
            project: "AIBL".to_string(),
            columns: ColumnNames::default(),
            multi_scan: MultiScanPolicy::default(),
            subject_errors: SubjectErrorPolicy::default(),
        }
    }
}

impl PrepConfig {
    /// Load a TOML config file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: PrepConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension must be non-empty and given without a dot, got `{}`",
                self.extension
            )));
        }
        if self.project.trim().is_empty() {
            return Err(ConfigError::Invalid("project must not be empty".to_string()));
        }
        Ok(())
    }
}
