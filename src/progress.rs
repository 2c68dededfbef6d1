//! Progress events emitted by a pipeline run.
//!
//! Stages report through a [`ProgressObserver`] instead of printing, so the
//! binary decides how progress looks and tests can record it.

use std::time::Duration;

use crate::pipeline::RunReport;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    DiscoveryFinished { files: usize, elapsed: Duration },
    /// `processed` counts files handled so far, starting at 0.
    Ingesting { processed: usize, total: usize },
    Coverage { covered: usize, selected: usize },
    /// `processed` counts subjects handled so far, starting at 0.
    Caching { processed: usize, total: usize },
    SubjectFailed { subject: String, error: String },
    Finished(RunReport),
}

pub trait ProgressObserver {
    fn on_event(&mut self, event: &ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullObserver;

impl ProgressObserver for NullObserver {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// Renders events through the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

fn percent(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

impl ProgressObserver for LogObserver {
    fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DiscoveryFinished { files, elapsed } => {
                log::info!("Extracted {files} scan files in {:.2}s", elapsed.as_secs_f64());
            }
            ProgressEvent::Ingesting { processed, total } => {
                log::debug!("ingest {:.2}%", percent(*processed, *total));
            }
            ProgressEvent::Coverage { covered, selected } => {
                log::info!("{covered}/{selected} subjects have scans available for use");
            }
            ProgressEvent::Caching { processed, total } => {
                log::debug!("center slices {:.2}%", percent(*processed, *total));
            }
            ProgressEvent::SubjectFailed { subject, error } => {
                log::warn!("subject {subject} skipped: {error}");
            }
            ProgressEvent::Finished(report) => {
                log::info!(
                    "Finished preparing images: {} copied, {} already present, \
                     {} slice artifacts computed, {} cached, {} failed ({:.2}s)",
                    report.copied,
                    report.already_present,
                    report.artifacts_computed,
                    report.artifacts_cached,
                    report.failed_subjects.len(),
                    report.elapsed.as_secs_f64()
                );
            }
        }
    }
}

/// Keeps every event; handy for callers that want to inspect a run.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<ProgressEvent>,
}

impl ProgressObserver for RecordingObserver {
    fn on_event(&mut self, event: &ProgressEvent) {
        self.events.push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty_totals() {
        assert_eq!(percent(0, 0), 100.0);
        assert_eq!(percent(1, 4), 25.0);
    }

    #[test]
    fn recording_observer_keeps_order() {
        let mut observer = RecordingObserver::default();
        observer.on_event(&ProgressEvent::Ingesting { processed: 0, total: 2 });
        observer.on_event(&ProgressEvent::Coverage { covered: 1, selected: 2 });
        assert_eq!(
            observer.events,
            vec![
                ProgressEvent::Ingesting { processed: 0, total: 2 },
                ProgressEvent::Coverage { covered: 1, selected: 2 },
            ]
        );
    }
}
