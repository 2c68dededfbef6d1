//! Image preparation pipeline.
//!
//! ```text
//!  source_root ──discover──▶ Vec<PathBuf>
//!  tabular file ──filter───▶ SelectionSet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  ingest   │  copy first scan of each selected subject → dataset_root/<id>/
//!   └──────────┘
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  cache    │  load → center slices → <id>_center_slices.parquet (once)
//!   └──────────┘
//! ```

pub mod cache;
pub mod ingest;

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::config::PrepConfig;
use crate::data::filter::{ColumnFilter, MetadataFilter};
use crate::data::loader::{self, TabularFormat};
use crate::discovery;
use crate::error::{DiscoveryError, PrepError};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::volume::{CenterSliceExtractor, NiftiScanLoader, ScanLoader, SliceExtractor};

// ---------------------------------------------------------------------------
// Selection set
// ---------------------------------------------------------------------------

/// Subjects that passed the metadata filter, in first-appearance order.
/// Built once per run and never modified afterwards.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    order: Vec<String>,
    members: HashSet<String>,
}

impl SelectionSet {
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = SelectionSet::default();
        for id in ids {
            let id = id.into();
            if set.members.insert(id.clone()) {
                set.order.push(id);
            }
        }
        set
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.members.contains(subject)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Ingestion ledger
// ---------------------------------------------------------------------------

/// Per-subject ingestion state. Ordered so that merging keeps the strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum IngestionStatus {
    #[default]
    NotIngested,
    /// The expected scan file was already in the dataset tree.
    AlreadyPresent,
    /// Copied during this run.
    Copied,
}

impl IngestionStatus {
    pub fn is_ingested(self) -> bool {
        self != IngestionStatus::NotIngested
    }
}

pub type IngestionLedger = HashMap<String, IngestionStatus>;

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Scan files found under the source root.
    pub discovered: usize,
    /// Subjects in the selection set.
    pub selected: usize,
    /// Selected subjects with at least one discovered scan.
    pub covered: usize,
    pub copied: usize,
    pub already_present: usize,
    /// Extra scans of an already ingested subject, under the `first` policy.
    pub duplicate_scans_skipped: usize,
    pub artifacts_computed: usize,
    pub artifacts_cached: usize,
    /// Selected subjects with neither an artifact nor an ingested scan.
    pub artifacts_without_scan: usize,
    pub failed_subjects: Vec<String>,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

/// State owned by one run and threaded through the stages.
#[derive(Debug)]
pub struct RunContext {
    pub selection: SelectionSet,
    pub ledger: IngestionLedger,
    pub report: RunReport,
}

impl RunContext {
    pub fn new(selection: SelectionSet) -> Self {
        let ledger = selection
            .iter()
            .map(|s| (s.to_string(), IngestionStatus::NotIngested))
            .collect();
        let report = RunReport {
            selected: selection.len(),
            ..RunReport::default()
        };
        Self {
            selection,
            ledger,
            report,
        }
    }

    pub fn status(&self, subject: &str) -> IngestionStatus {
        self.ledger.get(subject).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The preparation pipeline with its collaborators injected.
pub struct Pipeline {
    config: PrepConfig,
    filter: Box<dyn MetadataFilter>,
    loader: Box<dyn ScanLoader>,
    extractor: Box<dyn SliceExtractor>,
}

impl Pipeline {
    /// Pipeline with the default collaborators: CSV/JSON column filter,
    /// NIfTI-1 loader and center-slice extractor.
    pub fn new(config: PrepConfig) -> Self {
        let filter = ColumnFilter::new(
            config.columns.clone(),
            TabularFormat::from_path(&config.tabular_path),
        );
        Self {
            config,
            filter: Box::new(filter),
            loader: Box::new(NiftiScanLoader),
            extractor: Box::new(CenterSliceExtractor),
        }
    }

    pub fn with_filter(mut self, filter: impl MetadataFilter + 'static) -> Self {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_loader(mut self, loader: impl ScanLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_extractor(mut self, extractor: impl SliceExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    /// Run discovery, filtering, ingestion and the artifact cache once.
    pub fn run(&self, observer: &mut dyn ProgressObserver) -> Result<RunReport, PrepError> {
        let started = Instant::now();
        let config = &self.config;
        log::info!("Preparing images from {}", config.source_root.display());

        if !config.source_root.exists() {
            log::error!("source root {} doesn't exist", config.source_root.display());
            return Err(DiscoveryError::RootMissing(config.source_root.clone()).into());
        }

        let discovery_started = Instant::now();
        let files = discovery::discover_files(&config.source_root, &config.extension)?;
        observer.on_event(&ProgressEvent::DiscoveryFinished {
            files: files.len(),
            elapsed: discovery_started.elapsed(),
        });

        let selection = self.select_subjects()?;
        log::info!("{} subjects selected from {}", selection.len(), config.tabular_path.display());

        ensure_dir(&config.dataset_root)?;

        let mut ctx = RunContext::new(selection);
        ctx.report.discovered = files.len();

        ingest::run(&mut ctx, &files, &config.dataset_root, config.multi_scan, observer)?;

        ctx.report.covered = ingest::coverage(&ctx.selection, &files);
        observer.on_event(&ProgressEvent::Coverage {
            covered: ctx.report.covered,
            selected: ctx.selection.len(),
        });

        cache::run(
            &mut ctx,
            &config.dataset_root,
            cache::Collaborators {
                loader: self.loader.as_ref(),
                extractor: self.extractor.as_ref(),
            },
            config.subject_errors,
            observer,
        )?;

        ctx.report.elapsed = started.elapsed();
        observer.on_event(&ProgressEvent::Finished(ctx.report.clone()));
        Ok(ctx.report)
    }

    /// Read the tabular file and reduce it to the selection set.
    pub fn select_subjects(&self) -> Result<SelectionSet, PrepError> {
        let config = &self.config;
        let text = loader::read_text(&config.tabular_path)?;
        let table = self
            .filter
            .filter(&text, config.scan_number, &config.project)?;
        let ids = table.unique_keys(&config.columns.subject)?;
        Ok(SelectionSet::from_ids(ids))
    }
}

fn ensure_dir(path: &Path) -> Result<(), PrepError> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| PrepError::io(path, e))?;
    }
    Ok(())
}
