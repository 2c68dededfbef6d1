//! Minimal single-file NIfTI-1 (`.nii`) reader and writer.
//!
//! Only what the pipeline needs: the first 3-D volume of a file, converted
//! to `f32` with the header's intensity scaling applied.

use std::path::{Path, PathBuf};

use super::{ScanLoader, Volume};
use crate::error::ScanError;

const HEADER_SIZE: usize = 348;
const DATA_OFFSET: usize = 352;
const MAGIC_SINGLE_FILE: &[u8; 4] = b"n+1\0";

const DT_UINT8: i16 = 2;
const DT_INT16: i16 = 4;
const DT_INT32: i16 = 8;
const DT_FLOAT32: i16 = 16;
const DT_FLOAT64: i16 = 64;
const DT_INT8: i16 = 256;
const DT_UINT16: i16 = 512;
const DT_UINT32: i16 = 768;

// ---------------------------------------------------------------------------
// Byte access with runtime endianness
// ---------------------------------------------------------------------------

struct Bytes<'a> {
    buf: &'a [u8],
    big_endian: bool,
}

impl Bytes<'_> {
    fn array<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[at..at + N]);
        out
    }

    fn i16_at(&self, at: usize) -> i16 {
        let b = self.array::<2>(at);
        if self.big_endian { i16::from_be_bytes(b) } else { i16::from_le_bytes(b) }
    }

    fn f32_at(&self, at: usize) -> f32 {
        let b = self.array::<4>(at);
        if self.big_endian { f32::from_be_bytes(b) } else { f32::from_le_bytes(b) }
    }

    /// Decode one voxel of `datatype` starting at `at`.
    fn voxel(&self, datatype: i16, at: usize) -> f64 {
        let be = self.big_endian;
        match datatype {
            DT_UINT8 => self.buf[at] as f64,
            DT_INT8 => self.buf[at] as i8 as f64,
            DT_INT16 => self.i16_at(at) as f64,
            DT_UINT16 => {
                let b = self.array::<2>(at);
                (if be { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) }) as f64
            }
            DT_INT32 => {
                let b = self.array::<4>(at);
                (if be { i32::from_be_bytes(b) } else { i32::from_le_bytes(b) }) as f64
            }
            DT_UINT32 => {
                let b = self.array::<4>(at);
                (if be { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) }) as f64
            }
            DT_FLOAT32 => self.f32_at(at) as f64,
            DT_FLOAT64 => {
                let b = self.array::<8>(at);
                if be { f64::from_be_bytes(b) } else { f64::from_le_bytes(b) }
            }
            _ => f64::NAN,
        }
    }
}

fn bytes_per_voxel(datatype: i16) -> Option<usize> {
    match datatype {
        DT_UINT8 | DT_INT8 => Some(1),
        DT_INT16 | DT_UINT16 => Some(2),
        DT_INT32 | DT_UINT32 | DT_FLOAT32 => Some(4),
        DT_FLOAT64 => Some(8),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Read the first volume of a single-file NIfTI-1 scan.
pub fn read_nifti1(path: &Path) -> Result<Volume, ScanError> {
    let buf = std::fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_nifti1(path, &buf)
}

fn decode_nifti1(path: &Path, buf: &[u8]) -> Result<Volume, ScanError> {
    if buf.len() < HEADER_SIZE {
        return Err(ScanError::TruncatedHeader {
            path: path.to_path_buf(),
            len: buf.len(),
        });
    }

    let sizeof_hdr: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
    let big_endian = if i32::from_le_bytes(sizeof_hdr) == HEADER_SIZE as i32 {
        false
    } else if i32::from_be_bytes(sizeof_hdr) == HEADER_SIZE as i32 {
        true
    } else {
        return Err(ScanError::BadMagic { path: path.to_path_buf() });
    };
    if &buf[344..348] != MAGIC_SINGLE_FILE {
        return Err(ScanError::BadMagic { path: path.to_path_buf() });
    }

    let bytes = Bytes { buf, big_endian };

    let mut raw_dims = [0i16; 8];
    for (i, d) in raw_dims.iter_mut().enumerate() {
        *d = bytes.i16_at(40 + 2 * i);
    }
    let ndim = raw_dims[0];
    if !(1..=7).contains(&ndim) {
        return Err(ScanError::BadDimensions {
            path: path.to_path_buf(),
            dims: raw_dims,
        });
    }
    let mut dims = [1usize; 3];
    for (axis, dim) in dims.iter_mut().enumerate() {
        if (axis as i16) < ndim {
            let d = raw_dims[axis + 1];
            if d <= 0 {
                return Err(ScanError::BadDimensions {
                    path: path.to_path_buf(),
                    dims: raw_dims,
                });
            }
            *dim = d as usize;
        }
    }

    let datatype = bytes.i16_at(70);
    let width = bytes_per_voxel(datatype).ok_or(ScanError::UnsupportedDatatype {
        path: path.to_path_buf(),
        code: datatype,
    })?;

    // Float-to-int casts saturate, so a huge offset becomes usize::MAX here.
    let vox_offset = (bytes.f32_at(108).max(0.0) as usize).max(HEADER_SIZE);
    let needed = dims
        .iter()
        .try_fold(width, |acc, &d| acc.checked_mul(d))
        .and_then(|data| data.checked_add(vox_offset))
        .unwrap_or(usize::MAX);
    if buf.len() < needed {
        return Err(ScanError::TruncatedData {
            path: path.to_path_buf(),
            needed,
            available: buf.len(),
        });
    }

    let slope = bytes.f32_at(112) as f64;
    let inter = bytes.f32_at(116) as f64;
    let scale = slope != 0.0 && slope.is_finite() && !(slope == 1.0 && inter == 0.0);

    let count = dims[0] * dims[1] * dims[2];
    let voxels = (0..count)
        .map(|i| {
            let v = bytes.voxel(datatype, vox_offset + i * width);
            (if scale { v * slope + inter } else { v }) as f32
        })
        .collect();

    Ok(Volume::new(dims, voxels))
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Write a little-endian float32 single-file NIfTI-1 scan.
///
/// The header stores each dimension as an `i16`; larger volumes are refused
/// before anything is written.
pub fn write_nifti1(path: &Path, volume: &Volume) -> Result<(), ScanError> {
    let mut out = vec![0u8; DATA_OFFSET];
    out[0..4].copy_from_slice(&(HEADER_SIZE as i32).to_le_bytes());

    let mut dims: [i16; 8] = [3, 1, 1, 1, 1, 1, 1, 1];
    for (slot, &d) in dims[1..4].iter_mut().zip(&volume.dims) {
        *slot = i16::try_from(d).map_err(|_| ScanError::DimensionsTooLarge {
            path: path.to_path_buf(),
            dims: volume.dims,
        })?;
    }
    for (i, d) in dims.iter().enumerate() {
        out[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    out[70..72].copy_from_slice(&DT_FLOAT32.to_le_bytes());
    out[72..74].copy_from_slice(&32i16.to_le_bytes());
    for i in 0..8 {
        out[76 + 4 * i..80 + 4 * i].copy_from_slice(&1.0f32.to_le_bytes());
    }
    out[108..112].copy_from_slice(&(DATA_OFFSET as f32).to_le_bytes());
    out[112..116].copy_from_slice(&1.0f32.to_le_bytes());
    out[344..348].copy_from_slice(MAGIC_SINGLE_FILE);

    out.reserve(volume.voxels.len() * 4);
    for v in &volume.voxels {
        out.extend_from_slice(&v.to_le_bytes());
    }

    std::fs::write(path, out).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ---------------------------------------------------------------------------
// Scan loader
// ---------------------------------------------------------------------------

/// Loads `<dataset_root>/<subject>/<first .nii by name>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NiftiScanLoader;

impl NiftiScanLoader {
    /// The scan file the loader would read for `subject`, if any.
    pub fn scan_path(subject: &str, dataset_root: &Path) -> Result<PathBuf, ScanError> {
        let dir = dataset_root.join(subject);
        let no_scan = || ScanError::NoScan {
            subject: subject.to_string(),
            dir: dir.clone(),
        };

        let entries = std::fs::read_dir(&dir).map_err(|_| no_scan())?;
        let mut scans: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("nii"))
            .collect();
        scans.sort();
        scans.into_iter().next().ok_or_else(no_scan)
    }
}

impl ScanLoader for NiftiScanLoader {
    fn load(&self, subject: &str, dataset_root: &Path) -> Result<Volume, ScanError> {
        let path = Self::scan_path(subject, dataset_root)?;
        log::debug!("loading scan {}", path.display());
        read_nifti1(&path)
    }
}
