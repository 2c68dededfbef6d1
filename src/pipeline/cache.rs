use std::path::Path;

use super::RunContext;
use crate::artifact::{artifact_path, write_center_slices};
use crate::config::SubjectErrorPolicy;
use crate::error::PrepError;
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::volume::{ScanLoader, SliceExtractor};

/// The two collaborators the cache stage calls per subject.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub loader: &'a dyn ScanLoader,
    pub extractor: &'a dyn SliceExtractor,
}

/// Compute the center-slice artifact of every selected, ingested subject
/// that does not have one yet. Existing artifacts are never rewritten.
pub fn run(
    ctx: &mut RunContext,
    dataset_root: &Path,
    collaborators: Collaborators<'_>,
    on_error: SubjectErrorPolicy,
    observer: &mut dyn ProgressObserver,
) -> Result<(), PrepError> {
    let RunContext {
        selection,
        ledger,
        report,
    } = ctx;
    let total = selection.len();

    for (processed, subject) in selection.iter().enumerate() {
        observer.on_event(&ProgressEvent::Caching { processed, total });

        let path = artifact_path(dataset_root, subject);
        if path.exists() {
            report.artifacts_cached += 1;
            continue;
        }
        let ingested = ledger
            .get(subject)
            .is_some_and(|status| status.is_ingested());
        if !ingested {
            report.artifacts_without_scan += 1;
            continue;
        }

        match compute(subject, dataset_root, &path, collaborators) {
            Ok(()) => {
                log::debug!("subject {subject}: wrote {}", path.display());
                report.artifacts_computed += 1;
            }
            Err(e) => match on_error {
                SubjectErrorPolicy::Abort => return Err(e),
                SubjectErrorPolicy::Skip => {
                    observer.on_event(&ProgressEvent::SubjectFailed {
                        subject: subject.to_string(),
                        error: e.to_string(),
                    });
                    report.failed_subjects.push(subject.to_string());
                }
            },
        }
    }

    Ok(())
}

fn compute(
    subject: &str,
    dataset_root: &Path,
    path: &Path,
    collaborators: Collaborators<'_>,
) -> Result<(), PrepError> {
    let volume = collaborators
        .loader
        .load(subject, dataset_root)
        .map_err(|source| PrepError::Scan {
            subject: subject.to_string(),
            source,
        })?;
    let slices = collaborators
        .extractor
        .extract_center_slices(&volume)
        .map_err(|source| PrepError::Scan {
            subject: subject.to_string(),
            source,
        })?;
    write_center_slices(path, &slices).map_err(|source| PrepError::Artifact {
        subject: subject.to_string(),
        source,
    })
}
