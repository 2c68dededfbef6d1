use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{IngestionStatus, RunContext, SelectionSet};
use crate::config::MultiScanPolicy;
use crate::discovery::subject_id_of;
use crate::error::PrepError;
use crate::progress::{ProgressEvent, ProgressObserver};

/// Copy the scans of selected subjects into `dataset_root/<subject>/`.
///
/// A file counts as ingested when `dataset_root/<subject>/<file name>`
/// exists; nothing is copied over it. Subjects outside the selection set are
/// never touched.
pub fn run(
    ctx: &mut RunContext,
    files: &[PathBuf],
    dataset_root: &Path,
    policy: MultiScanPolicy,
    observer: &mut dyn ProgressObserver,
) -> Result<(), PrepError> {
    let total = files.len();

    for (processed, file) in files.iter().enumerate() {
        observer.on_event(&ProgressEvent::Ingesting { processed, total });

        let Some(subject) = subject_id_of(file) else {
            log::warn!("cannot derive a subject id from {}", file.display());
            continue;
        };
        if !ctx.selection.contains(&subject) {
            continue;
        }
        if policy == MultiScanPolicy::First && ctx.status(&subject).is_ingested() {
            log::debug!("subject {subject}: ignoring extra scan {}", file.display());
            ctx.report.duplicate_scans_skipped += 1;
            continue;
        }
        let Some(file_name) = file.file_name() else {
            continue;
        };

        let target_dir = dataset_root.join(&subject);
        let target = target_dir.join(file_name);

        if target.exists() {
            mark(ctx, &subject, IngestionStatus::AlreadyPresent);
            ctx.report.already_present += 1;
            continue;
        }

        if !target_dir.exists() {
            std::fs::create_dir_all(&target_dir).map_err(|e| PrepError::io(&target_dir, e))?;
        }
        std::fs::copy(file, &target).map_err(|e| PrepError::io(&target, e))?;
        log::debug!("subject {subject}: copied {}", file.display());

        mark(ctx, &subject, IngestionStatus::Copied);
        ctx.report.copied += 1;
    }

    Ok(())
}

fn mark(ctx: &mut RunContext, subject: &str, status: IngestionStatus) {
    let entry = ctx.ledger.entry(subject.to_string()).or_default();
    *entry = (*entry).max(status);
}

/// Number of selected subjects that appear as a parent directory of any
/// discovered file.
pub fn coverage(selection: &SelectionSet, files: &[PathBuf]) -> usize {
    let discovered: HashSet<String> = files.iter().filter_map(|f| subject_id_of(f)).collect();
    selection.iter().filter(|s| discovered.contains(*s)).count()
}
