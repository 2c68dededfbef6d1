//! Center-slice artifact persistence.
//!
//! One Parquet file per subject, one row per plane:
//!
//! | column   | type            |
//! |----------|-----------------|
//! | `plane`  | Utf8            |
//! | `rows`   | Int64           |
//! | `cols`   | Int64           |
//! | `values` | List<Float32>   |

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, Float32Array, Float32Builder, Int64Array, ListArray, ListBuilder, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use crate::error::ArtifactError;
use crate::volume::{CenterSlices, Plane, Slice2D};

pub const ARTIFACT_SUFFIX: &str = "_center_slices.parquet";

/// `<dataset_root>/<subject>/<subject>_center_slices.parquet`
pub fn artifact_path(dataset_root: &Path, subject: &str) -> PathBuf {
    dataset_root
        .join(subject)
        .join(format!("{subject}{ARTIFACT_SUFFIX}"))
}

fn schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("plane", DataType::Utf8, false),
        Field::new("rows", DataType::Int64, false),
        Field::new("cols", DataType::Int64, false),
        Field::new(
            "values",
            DataType::List(Arc::new(Field::new("item", DataType::Float32, true))),
            false,
        ),
    ]))
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Persist `slices` at `path`.
///
/// The file is written under a temporary name and renamed into place, so a
/// failed write never leaves something that looks like a finished artifact.
pub fn write_center_slices(path: &Path, slices: &CenterSlices) -> Result<(), ArtifactError> {
    let planes = StringArray::from(
        slices
            .slices
            .iter()
            .map(|s| s.plane.as_str())
            .collect::<Vec<_>>(),
    );
    let rows = Int64Array::from(slices.slices.iter().map(|s| s.rows as i64).collect::<Vec<_>>());
    let cols = Int64Array::from(slices.slices.iter().map(|s| s.cols as i64).collect::<Vec<_>>());

    let mut values_builder = ListBuilder::new(Float32Builder::new());
    for slice in &slices.slices {
        values_builder.values().append_slice(&slice.values);
        values_builder.append(true);
    }
    let values = values_builder.finish();

    let schema = schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(planes),
            Arc::new(rows),
            Arc::new(cols),
            Arc::new(values),
        ],
    )?;

    let tmp_path = path.with_extension("parquet.tmp");
    let file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
    let written = (|| -> Result<(), ArtifactError> {
        let mut writer = ArrowWriter::try_new(file, schema, None)?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    })();
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    std::fs::rename(&tmp_path, path).map_err(|source| {
        let _ = std::fs::remove_file(&tmp_path);
        ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Read an artifact back.
pub fn read_center_slices(path: &Path) -> Result<CenterSlices, ArtifactError> {
    let malformed = |reason: &str| ArtifactError::Malformed {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let file = File::open(path).map_err(io_err(path))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut slices = Vec::new();
    for batch_result in reader {
        let batch = batch_result?;
        let column = |name: &str| {
            batch
                .column_by_name(name)
                .cloned()
                .ok_or_else(|| malformed(&format!("missing `{name}` column")))
        };

        let planes = column("plane")?;
        let planes = planes
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| malformed("`plane` is not Utf8"))?;
        let rows = column("rows")?;
        let rows = rows
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| malformed("`rows` is not Int64"))?;
        let cols = column("cols")?;
        let cols = cols
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| malformed("`cols` is not Int64"))?;
        let values = column("values")?;
        let values = values
            .as_any()
            .downcast_ref::<ListArray>()
            .ok_or_else(|| malformed("`values` is not a list"))?;

        for row in 0..batch.num_rows() {
            let plane = Plane::parse(planes.value(row))
                .ok_or_else(|| malformed(&format!("unknown plane `{}`", planes.value(row))))?;
            let inner = values.value(row);
            let floats = inner
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| malformed("`values` items are not Float32"))?;

            let slice = Slice2D {
                plane,
                rows: rows.value(row) as usize,
                cols: cols.value(row) as usize,
                values: floats.iter().map(|v| v.unwrap_or(f32::NAN)).collect(),
            };
            if slice.rows * slice.cols != slice.values.len() {
                return Err(malformed(&format!("{plane} slice shape does not match its values")));
            }
            slices.push(slice);
        }
    }

    Ok(CenterSlices { slices })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{CenterSliceExtractor, SliceExtractor, Volume};

    #[test]
    fn artifact_path_is_subject_scoped() {
        let path = artifact_path(Path::new("/data/mri_images"), "P1");
        assert_eq!(path, PathBuf::from("/data/mri_images/P1/P1_center_slices.parquet"));
    }

    #[test]
    fn written_slices_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P1_center_slices.parquet");
        let volume = Volume::from_fn([3, 4, 5], |x, y, z| (x * y + z) as f32 - 2.5);
        let slices = CenterSliceExtractor.extract_center_slices(&volume).unwrap();

        write_center_slices(&path, &slices).unwrap();

        assert_eq!(read_center_slices(&path).unwrap(), slices);
        assert!(!path.with_extension("parquet.tmp").exists());
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P1_center_slices.parquet");
        // A non-empty directory cannot be replaced by a file.
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"x").unwrap();
        let slices = CenterSliceExtractor
            .extract_center_slices(&Volume::from_fn([2, 2, 2], |x, _, _| x as f32))
            .unwrap();

        assert!(matches!(
            write_center_slices(&path, &slices),
            Err(ArtifactError::Io { .. })
        ));
        assert!(!path.with_extension("parquet.tmp").exists());
        assert!(path.join("keep").exists());
    }

    #[test]
    fn non_parquet_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("P1_center_slices.parquet");
        std::fs::write(&path, b"sentinel").unwrap();
        assert!(read_center_slices(&path).is_err());
    }
}
