use std::collections::{BTreeMap, HashSet};

use crate::error::FilterError;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata cell mirroring common Pandas dtypes.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put MetadataValue in BTreeSet --

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn discriminant(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let da = discriminant(self);
        let db = discriminant(other);
        if da != db {
            return da.cmp(&db);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl MetadataValue {
    /// Render the value as an identifier key.
    ///
    /// Floats with an integral value lose their fraction
    /// (`1001.0` → `"1001"`), so ids read back from a CSV column that pandas
    /// would have upcast still line up with directory names. `Null` has no
    /// key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            MetadataValue::String(s) => Some(s.trim().to_string()),
            MetadataValue::Integer(i) => Some(i.to_string()),
            MetadataValue::Float(v) if v.fract() == 0.0 && v.is_finite() => {
                Some(format!("{}", *v as i64))
            }
            MetadataValue::Float(v) => Some(v.to_string()),
            MetadataValue::Bool(b) => Some(b.to_string()),
            MetadataValue::Null => None,
        }
    }
}

// ---------------------------------------------------------------------------
// MetadataRecord – one row of the tabular file
// ---------------------------------------------------------------------------

/// A single row: column_name → value.
#[derive(Debug, Clone, Default)]
pub struct MetadataRecord {
    pub cells: BTreeMap<String, MetadataValue>,
}

impl MetadataRecord {
    pub fn get(&self, column: &str) -> Option<&MetadataValue> {
        self.cells.get(column)
    }
}

// ---------------------------------------------------------------------------
// MetadataTable – the complete parsed tabular file
// ---------------------------------------------------------------------------

/// The full parsed table.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    /// All rows, in file order.
    pub records: Vec<MetadataRecord>,
    /// Column names in header order.
    pub column_names: Vec<String>,
}

impl MetadataTable {
    /// `column_names` keeps the header order of the source file.
    pub fn from_records(column_names: Vec<String>, records: Vec<MetadataRecord>) -> Self {
        MetadataTable {
            records,
            column_names,
        }
    }

    /// Keep only the rows at `indices`, preserving their order.
    pub fn select(&self, indices: &[usize]) -> Self {
        let records = indices
            .iter()
            .filter_map(|&i| self.records.get(i).cloned())
            .collect();
        MetadataTable::from_records(self.column_names.clone(), records)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Unique keys of `column` in first-appearance order.
    ///
    /// This is the accessor the pipeline uses to build its selection set,
    /// so a missing column or an empty id cell is an error rather than a
    /// silently shorter list.
    pub fn unique_keys(&self, column: &str) -> Result<Vec<String>, FilterError> {
        if !self.has_column(column) {
            return Err(FilterError::MissingColumn(column.to_string()));
        }

        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        for (row, rec) in self.records.iter().enumerate() {
            let key = rec
                .get(column)
                .and_then(MetadataValue::as_key)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| FilterError::EmptyCell {
                    row,
                    column: column.to_string(),
                })?;
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, MetadataValue)]) -> MetadataRecord {
        MetadataRecord {
            cells: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn unique_keys_keep_first_appearance_order() {
        let table = MetadataTable::from_records(
            vec!["PATIENT_ID".into()],
            vec![
                record(&[("PATIENT_ID", MetadataValue::Integer(30))]),
                record(&[("PATIENT_ID", MetadataValue::Integer(10))]),
                record(&[("PATIENT_ID", MetadataValue::Integer(30))]),
                record(&[("PATIENT_ID", MetadataValue::String("20".into()))]),
            ],
        );

        let keys = table.unique_keys("PATIENT_ID").unwrap();
        assert_eq!(keys, vec!["30", "10", "20"]);
    }

    #[test]
    fn unique_keys_rejects_missing_column() {
        let table = MetadataTable::from_records(vec!["OTHER".into()], Vec::new());
        assert!(matches!(
            table.unique_keys("PATIENT_ID"),
            Err(FilterError::MissingColumn(c)) if c == "PATIENT_ID"
        ));
    }

    #[test]
    fn unique_keys_rejects_null_ids() {
        let table = MetadataTable::from_records(
            vec!["PATIENT_ID".into()],
            vec![record(&[("PATIENT_ID", MetadataValue::Null)])],
        );
        assert!(matches!(
            table.unique_keys("PATIENT_ID"),
            Err(FilterError::EmptyCell { row: 0, .. })
        ));
    }

    #[test]
    fn integral_floats_render_as_integer_keys() {
        assert_eq!(MetadataValue::Float(1001.0).as_key().as_deref(), Some("1001"));
        assert_eq!(MetadataValue::Float(2.5).as_key().as_deref(), Some("2.5"));
        assert_eq!(MetadataValue::Null.as_key(), None);
    }
}
