use std::collections::{BTreeMap, BTreeSet};

use super::loader::{self, TabularFormat};
use super::model::{MetadataTable, MetadataValue};
use crate::config::ColumnNames;
use crate::error::FilterError;

// ---------------------------------------------------------------------------
// Filter predicate: which values are accepted per column
// ---------------------------------------------------------------------------

/// Per-column selection state: maps column_name → set of accepted values.
/// Every listed column must match; an empty set accepts nothing.
pub type FilterState = BTreeMap<String, BTreeSet<MetadataValue>>;

/// Return indices of rows that pass all filters.
///
/// A row passes a column filter when:
/// * The filter set for that column is empty → nothing selected → fails
/// * The row's value for that column is in the selected set → passes
/// * The row has no value for the column → passes only if Null is selected
pub fn filtered_indices(table: &MetadataTable, filters: &FilterState) -> Vec<usize> {
    table
        .records
        .iter()
        .enumerate()
        .filter(|(_, rec)| {
            for (col, selected) in filters {
                if selected.is_empty() {
                    return false;
                }
                match rec.get(col) {
                    Some(val) => {
                        if !selected.contains(val) {
                            return false;
                        }
                    }
                    None => {
                        if !selected.contains(&MetadataValue::Null) {
                            return false;
                        }
                    }
                }
            }
            true
        })
        .map(|(i, _)| i)
        .collect()
}

// ---------------------------------------------------------------------------
// Metadata filter collaborator
// ---------------------------------------------------------------------------

/// Restricts raw tabular text to the rows of one scan index and project.
pub trait MetadataFilter {
    fn filter(
        &self,
        text: &str,
        scan_number: i64,
        project: &str,
    ) -> Result<MetadataTable, FilterError>;
}

/// Default filter: exact match on a scan-number column and a project column.
#[derive(Debug, Clone)]
pub struct ColumnFilter {
    pub columns: ColumnNames,
    pub format: TabularFormat,
}

impl ColumnFilter {
    pub fn new(columns: ColumnNames, format: TabularFormat) -> Self {
        Self { columns, format }
    }

    /// Build the predicate for one scan index and project label.
    ///
    /// Scan numbers are accepted both as integers and as integral floats, so
    /// a column that went through a float dtype (`1.0`) still matches.
    pub fn filter_state(&self, scan_number: i64, project: &str) -> FilterState {
        let mut state = FilterState::new();
        state.insert(
            self.columns.scan_number.clone(),
            BTreeSet::from([
                MetadataValue::Integer(scan_number),
                MetadataValue::Float(scan_number as f64),
            ]),
        );
        state.insert(
            self.columns.project.clone(),
            BTreeSet::from([MetadataValue::String(project.trim().to_string())]),
        );
        state
    }
}

impl MetadataFilter for ColumnFilter {
    fn filter(
        &self,
        text: &str,
        scan_number: i64,
        project: &str,
    ) -> Result<MetadataTable, FilterError> {
        let table = loader::parse_text(text, self.format)?;

        for column in [
            &self.columns.subject,
            &self.columns.scan_number,
            &self.columns.project,
        ] {
            if !table.has_column(column) {
                return Err(FilterError::MissingColumn(column.clone()));
            }
        }

        let state = self.filter_state(scan_number, project);
        let indices = filtered_indices(&table, &state);
        log::debug!(
            "metadata filter kept {}/{} rows (scan {scan_number}, project {project})",
            indices.len(),
            table.len()
        );
        Ok(table.select(&indices))
    }
}
