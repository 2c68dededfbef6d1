//! Volumetric scan data and the collaborators that produce and reduce it.
//!
//! ```text
//!  <dataset_root>/<subject>/*.nii
//!        │
//!        ▼
//!   ┌─────────────┐
//!   │ ScanLoader   │  NIfTI-1 → Volume
//!   └─────────────┘
//!        │
//!        ▼
//!   ┌────────────────┐
//!   │ SliceExtractor  │  Volume → CenterSlices (sagittal, coronal, axial)
//!   └────────────────┘
//! ```

use std::fmt;
use std::path::Path;

use crate::error::ScanError;

pub mod nifti;

pub use nifti::NiftiScanLoader;

// ---------------------------------------------------------------------------
// Volume – a 3-D voxel grid
// ---------------------------------------------------------------------------

/// Voxel intensities in NIfTI order: x varies fastest, then y, then z.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub dims: [usize; 3],
    pub voxels: Vec<f32>,
}

impl Volume {
    /// # Panics
    ///
    /// If `voxels.len()` is not the product of `dims`.
    pub fn new(dims: [usize; 3], voxels: Vec<f32>) -> Self {
        assert_eq!(
            dims[0] * dims[1] * dims[2],
            voxels.len(),
            "voxel count does not match dims {dims:?}"
        );
        Self { dims, voxels }
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(dims: [usize; 3], mut f: impl FnMut(usize, usize, usize) -> f32) -> Self {
        let mut voxels = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    voxels.push(f(x, y, z));
                }
            }
        }
        Self { dims, voxels }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        let [nx, ny, _] = self.dims;
        self.voxels[x + nx * (y + ny * z)]
    }

    pub fn center(&self) -> [usize; 3] {
        [self.dims[0] / 2, self.dims[1] / 2, self.dims[2] / 2]
    }
}

// ---------------------------------------------------------------------------
// Center slices – the derived artifact payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Sagittal,
    Coronal,
    Axial,
}

impl Plane {
    pub const ALL: [Plane; 3] = [Plane::Sagittal, Plane::Coronal, Plane::Axial];

    pub fn as_str(self) -> &'static str {
        match self {
            Plane::Sagittal => "sagittal",
            Plane::Coronal => "coronal",
            Plane::Axial => "axial",
        }
    }

    pub fn parse(s: &str) -> Option<Plane> {
        Plane::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One 2-D slice, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice2D {
    pub plane: Plane,
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<f32>,
}

impl Slice2D {
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.cols + col]
    }
}

/// The three orthogonal slices through a volume's center voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct CenterSlices {
    pub slices: Vec<Slice2D>,
}

impl CenterSlices {
    pub fn plane(&self, plane: Plane) -> Option<&Slice2D> {
        self.slices.iter().find(|s| s.plane == plane)
    }
}

// ---------------------------------------------------------------------------
// Collaborator seams
// ---------------------------------------------------------------------------

/// Loads the raw volume of an ingested subject.
pub trait ScanLoader {
    fn load(&self, subject: &str, dataset_root: &Path) -> Result<Volume, ScanError>;
}

/// Reduces a volume to its center slices.
pub trait SliceExtractor {
    fn extract_center_slices(&self, volume: &Volume) -> Result<CenterSlices, ScanError>;
}

/// Takes the slice at `dim / 2` along each axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct CenterSliceExtractor;

impl SliceExtractor for CenterSliceExtractor {
    fn extract_center_slices(&self, volume: &Volume) -> Result<CenterSlices, ScanError> {
        let [nx, ny, nz] = volume.dims;
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(ScanError::EmptyVolume(volume.dims));
        }
        let [cx, cy, cz] = volume.center();

        let sagittal = Slice2D {
            plane: Plane::Sagittal,
            rows: ny,
            cols: nz,
            values: (0..ny)
                .flat_map(|y| (0..nz).map(move |z| (y, z)))
                .map(|(y, z)| volume.get(cx, y, z))
                .collect(),
        };
        let coronal = Slice2D {
            plane: Plane::Coronal,
            rows: nx,
            cols: nz,
            values: (0..nx)
                .flat_map(|x| (0..nz).map(move |z| (x, z)))
                .map(|(x, z)| volume.get(x, cy, z))
                .collect(),
        };
        let axial = Slice2D {
            plane: Plane::Axial,
            rows: nx,
            cols: ny,
            values: (0..nx)
                .flat_map(|x| (0..ny).map(move |y| (x, y)))
                .map(|(x, y)| volume.get(x, y, cz))
                .collect(),
        };

        Ok(CenterSlices {
            slices: vec![sagittal, coronal, axial],
        })
    }
}
