//! End-to-end runs of the preparation pipeline against scratch trees.
//!
//! Covers:
//! 1. Selected subjects are copied and get a center-slice artifact
//! 2. A rerun over an unchanged tree writes nothing
//! 3. Precondition and malformed-input failures
//! 4. Injected collaborators replace the defaults

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

use tempfile::TempDir;

use mri_prep::artifact::{artifact_path, read_center_slices};
use mri_prep::config::SubjectErrorPolicy;
use mri_prep::data::filter::MetadataFilter;
use mri_prep::data::loader::parse_csv;
use mri_prep::data::model::MetadataTable;
use mri_prep::error::{DiscoveryError, FilterError, PrepError, ScanError};
use mri_prep::progress::{NullObserver, ProgressEvent, RecordingObserver};
use mri_prep::volume::nifti::write_nifti1;
use mri_prep::volume::{Plane, ScanLoader, Volume};
use mri_prep::{Pipeline, PrepConfig};

const TABULAR: &str = "\
PATIENT_ID,SCAN_NUM,PROJECT
P1,1,AIBL
P1,2,AIBL
P2,2,AIBL
P3,1,AIBL
P4,1,AIBL
P5,1,ADNI
";

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    dataset: PathBuf,
    tabular: PathBuf,
}

impl Workspace {
    fn new(scans: &[&str], tabular: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("AIBL");
        let dataset = dir.path().join("data/mri_images");
        let tabular_path = dir.path().join("data/tabular_data.csv");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(tabular_path.parent().unwrap()).unwrap();
        fs::write(&tabular_path, tabular).unwrap();

        for (i, rel) in scans.iter().enumerate() {
            let path = source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            let volume = Volume::from_fn([5, 4, 3], |x, y, z| (i * 1000 + x * 100 + y * 10 + z) as f32);
            write_nifti1(&path, &volume).unwrap();
        }

        Workspace {
            _dir: dir,
            source,
            dataset,
            tabular: tabular_path,
        }
    }

    fn config(&self) -> PrepConfig {
        PrepConfig {
            source_root: self.source.clone(),
            dataset_root: self.dataset.clone(),
            tabular_path: self.tabular.clone(),
            ..PrepConfig::default()
        }
    }

    /// Relative path → modification time of everything under the dataset root.
    fn snapshot(&self) -> BTreeMap<String, SystemTime> {
        let mut out = BTreeMap::new();
        collect(&self.dataset, &self.dataset, &mut out);
        out
    }
}

fn collect(base: &Path, dir: &Path, out: &mut BTreeMap<String, SystemTime>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let rel = path.strip_prefix(base).unwrap().to_string_lossy().replace('\\', "/");
        out.insert(rel, entry.metadata().unwrap().modified().unwrap());
        if path.is_dir() {
            collect(base, &path, out);
        }
    }
}

#[test]
fn selected_subjects_are_ingested_and_cached() {
    let ws = Workspace::new(&["P1/a.nii", "P2/b.nii", "P3/c.nii"], TABULAR);

    let report = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap();

    let entries: Vec<String> = ws.snapshot().into_keys().collect();
    assert_eq!(
        entries,
        vec![
            "P1",
            "P1/P1_center_slices.parquet",
            "P1/a.nii",
            "P3",
            "P3/P3_center_slices.parquet",
            "P3/c.nii",
        ]
    );

    assert_eq!(report.discovered, 3);
    assert_eq!(report.selected, 3); // P1, P3, P4
    assert_eq!(report.covered, 2);
    assert_eq!(report.copied, 2);
    assert_eq!(report.artifacts_computed, 2);
    assert_eq!(report.artifacts_without_scan, 1);

    // P3 was the third scan written: values start at 2000.
    let slices = read_center_slices(&artifact_path(&ws.dataset, "P3")).unwrap();
    let axial = slices.plane(Plane::Axial).unwrap();
    assert_eq!((axial.rows, axial.cols), (5, 4));
    assert_eq!(axial.get(4, 3), 2000.0 + 400.0 + 30.0 + 1.0);
}

#[test]
fn rerun_over_unchanged_tree_writes_nothing() {
    let ws = Workspace::new(&["P1/a.nii", "P2/b.nii", "P3/c.nii"], TABULAR);
    Pipeline::new(ws.config()).run(&mut NullObserver).unwrap();
    let before = ws.snapshot();

    let report = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap();

    assert_eq!(report.copied, 0);
    assert_eq!(report.already_present, 2);
    assert_eq!(report.artifacts_computed, 0);
    assert_eq!(report.artifacts_cached, 2);
    assert_eq!(ws.snapshot(), before);
}

#[test]
fn sentinel_artifact_survives_a_rerun() {
    let ws = Workspace::new(&["P1/a.nii"], TABULAR);
    fs::create_dir_all(ws.dataset.join("P1")).unwrap();
    let artifact = artifact_path(&ws.dataset, "P1");
    fs::write(&artifact, b"sentinel").unwrap();

    let report = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap();

    assert_eq!(fs::read(&artifact).unwrap(), b"sentinel");
    assert_eq!(report.copied, 1);
    assert_eq!(report.artifacts_cached, 1);
}

#[test]
fn interrupted_run_is_completed_next_time() {
    let ws = Workspace::new(&["P1/a.nii"], TABULAR);
    fs::create_dir_all(ws.dataset.join("P1")).unwrap();
    fs::copy(ws.source.join("P1/a.nii"), ws.dataset.join("P1/a.nii")).unwrap();

    let report = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap();

    assert_eq!(report.copied, 0);
    assert_eq!(report.already_present, 1);
    assert_eq!(report.artifacts_computed, 1);
    assert!(artifact_path(&ws.dataset, "P1").exists());
}

#[test]
fn nested_source_layout_is_flattened_per_subject() {
    let ws = Workspace::new(&["site_a/2008/P1/MPRAGE.nii", "site_b/P3/MPRAGE.nii"], TABULAR);
    let mut observer = RecordingObserver::default();

    Pipeline::new(ws.config()).run(&mut observer).unwrap();

    assert!(ws.dataset.join("P1/MPRAGE.nii").exists());
    assert!(ws.dataset.join("P3/MPRAGE.nii").exists());
    assert!(observer
        .events
        .contains(&ProgressEvent::Coverage { covered: 2, selected: 3 }));
    assert!(matches!(observer.events.last(), Some(ProgressEvent::Finished(_))));
}

#[test]
fn missing_source_root_aborts_without_side_effects() {
    let ws = Workspace::new(&[], TABULAR);
    fs::remove_dir_all(&ws.source).unwrap();

    let err = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap_err();

    assert!(matches!(err, PrepError::Discovery(DiscoveryError::RootMissing(_))));
    assert!(!ws.dataset.exists());
}

#[test]
fn tabular_without_subject_column_is_fatal() {
    let ws = Workspace::new(&["P1/a.nii"], "ID,SCAN_NUM,PROJECT\nP1,1,AIBL\n");

    let err = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap_err();

    assert!(matches!(err, PrepError::Filter(FilterError::MissingColumn(ref c)) if c == "PATIENT_ID"));
    assert!(!ws.dataset.exists());
}

#[test]
fn unreadable_tabular_file_is_fatal() {
    let ws = Workspace::new(&["P1/a.nii"], TABULAR);
    fs::remove_file(&ws.tabular).unwrap();

    let err = Pipeline::new(ws.config()).run(&mut NullObserver).unwrap_err();
    assert!(matches!(err, PrepError::Filter(FilterError::Read { .. })));
}

/// Ignores the selectors and keeps every row.
struct KeepAll;

impl MetadataFilter for KeepAll {
    fn filter(&self, text: &str, _scan: i64, _project: &str) -> Result<MetadataTable, FilterError> {
        parse_csv(text)
    }
}

/// Fails for every subject and counts the attempts.
struct BrokenLoader {
    calls: Rc<Cell<usize>>,
}

impl ScanLoader for BrokenLoader {
    fn load(&self, subject: &str, dataset_root: &Path) -> Result<Volume, ScanError> {
        self.calls.set(self.calls.get() + 1);
        Err(ScanError::NoScan {
            subject: subject.to_string(),
            dir: dataset_root.join(subject),
        })
    }
}

#[test]
fn injected_collaborators_replace_the_defaults() {
    let ws = Workspace::new(&["P1/a.nii", "P2/b.nii", "P5/e.nii"], TABULAR);
    let calls = Rc::new(Cell::new(0));
    let config = PrepConfig {
        subject_errors: SubjectErrorPolicy::Skip,
        ..ws.config()
    };

    let report = Pipeline::new(config)
        .with_filter(KeepAll)
        .with_loader(BrokenLoader {
            calls: Rc::clone(&calls),
        })
        .run(&mut NullObserver)
        .unwrap();

    // KeepAll selects P1..P5, so P2 and P5 are copied too.
    assert_eq!(report.selected, 5);
    assert_eq!(report.copied, 3);
    assert!(ws.dataset.join("P5/e.nii").exists());
    assert_eq!(calls.get(), 3);
    assert_eq!(report.failed_subjects, vec!["P1", "P2", "P5"]);
    assert!(!artifact_path(&ws.dataset, "P1").exists());
}
