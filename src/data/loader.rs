use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value as JsonValue;

use super::model::{MetadataRecord, MetadataTable, MetadataValue};
use crate::error::FilterError;

// ---------------------------------------------------------------------------
// Format dispatch
// ---------------------------------------------------------------------------

/// Text formats the tabular metadata file may come in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TabularFormat {
    #[default]
    Csv,
    Json,
}

impl TabularFormat {
    /// Pick a format by extension; anything that is not `.json` is CSV.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => TabularFormat::Json,
            _ => TabularFormat::Csv,
        }
    }
}

/// Read the whole tabular file as UTF-8 text.
pub fn read_text(path: &Path) -> Result<String, FilterError> {
    std::fs::read_to_string(path).map_err(|source| FilterError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse tabular text in the given format.
pub fn parse_text(text: &str, format: TabularFormat) -> Result<MetadataTable, FilterError> {
    match format {
        TabularFormat::Csv => parse_csv(text),
        TabularFormat::Json => parse_json(text),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// CSV layout: header row with column names, one subject scan per row.
pub fn parse_csv(text: &str) -> Result<MetadataTable, FilterError> {
    let mut reader = csv::Reader::from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut records = Vec::new();

    for result in reader.records() {
        let row = result?;

        let mut cells = BTreeMap::new();
        for (col_idx, value) in row.iter().enumerate() {
            let Some(col_name) = headers.get(col_idx) else {
                continue;
            };
            cells.insert(col_name.clone(), guess_metadata_type(value.trim()));
        }

        records.push(MetadataRecord { cells });
    }

    Ok(MetadataTable::from_records(headers, records))
}

fn guess_metadata_type(s: &str) -> MetadataValue {
    if s.is_empty() {
        return MetadataValue::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return MetadataValue::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return MetadataValue::Float(f);
    }
    if s == "true" || s == "false" {
        return MetadataValue::Bool(s == "true");
    }
    MetadataValue::String(s.to_string())
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "PATIENT_ID": 1001, "SCAN_NUM": 1, "PROJECT": "AIBL" },
///   ...
/// ]
/// ```
pub fn parse_json(text: &str) -> Result<MetadataTable, FilterError> {
    let root: JsonValue = serde_json::from_str(text)?;

    let rows = root.as_array().ok_or(FilterError::NotAnArray)?;

    let mut column_names: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or(FilterError::RowNotObject(i))?;

        let mut cells = BTreeMap::new();
        for (key, val) in obj {
            if !column_names.contains(key) {
                column_names.push(key.clone());
            }
            cells.insert(key.clone(), json_to_metadata(val));
        }

        records.push(MetadataRecord { cells });
    }

    Ok(MetadataTable::from_records(column_names, records))
}

fn json_to_metadata(val: &JsonValue) -> MetadataValue {
    match val {
        JsonValue::String(s) => MetadataValue::String(s.trim().to_string()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                MetadataValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                MetadataValue::Float(f)
            } else {
                MetadataValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => MetadataValue::Bool(*b),
        JsonValue::Null => MetadataValue::Null,
        other => MetadataValue::String(other.to_string()),
    }
}
