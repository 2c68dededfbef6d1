//! Error types for each pipeline stage and the run as a whole.

use std::path::PathBuf;

use thiserror::Error;

/// Reading or filtering the tabular metadata failed.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("failed to read tabular file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a top-level JSON array of records")]
    NotAnArray,
    #[error("JSON row {0} is not an object")]
    RowNotObject(usize),
    #[error("tabular data has no `{0}` column")]
    MissingColumn(String),
    #[error("row {row} has an empty `{column}` value")]
    EmptyCell { row: usize, column: String },
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("source root not found: {0}")]
    RootMissing(PathBuf),
    #[error("source root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Loading a volume or reducing it to center slices failed.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no .nii scan found for subject `{subject}` in {dir}")]
    NoScan { subject: String, dir: PathBuf },
    #[error("failed to read scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: file too short for a NIfTI-1 header ({len} bytes)")]
    TruncatedHeader { path: PathBuf, len: usize },
    #[error("{path}: not a NIfTI-1 file (bad sizeof_hdr or magic)")]
    BadMagic { path: PathBuf },
    #[error("{path}: unsupported NIfTI datatype code {code}")]
    UnsupportedDatatype { path: PathBuf, code: i16 },
    #[error("{path}: invalid dimensions {dims:?}")]
    BadDimensions { path: PathBuf, dims: [i16; 8] },
    #[error("{path}: voxel data truncated (need {needed} bytes, have {available})")]
    TruncatedData {
        path: PathBuf,
        needed: usize,
        available: usize,
    },
    #[error("{path}: dimensions {dims:?} do not fit a NIfTI-1 header")]
    DimensionsTooLarge { path: PathBuf, dims: [usize; 3] },
    #[error("volume is empty along at least one axis: {0:?}")]
    EmptyVolume([usize; 3]),
}

/// Persisting or reading a center-slice artifact failed.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("artifact {path} is malformed: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("configuration error: {0}")]
    Invalid(String),
}

/// Top-level failure of a pipeline run.
#[derive(Debug, Error)]
pub enum PrepError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error("filesystem operation on {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("subject `{subject}`: {source}")]
    Scan {
        subject: String,
        #[source]
        source: ScanError,
    },
    #[error("subject `{subject}`: {source}")]
    Artifact {
        subject: String,
        #[source]
        source: ArtifactError,
    },
}

impl PrepError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.into(),
            source,
        }
    }
}
