use crate::enums::Orientation;
use crate::error::{Result, ViewerError};

use nalgebra::{Point3, Vector3};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut3, s};

/// A 3D block of scalar intensities with its grid-to-world mapping.
///
/// Data is stored `(depth, height, width)`, i.e. `(z, y, x)`. The world
/// position of voxel `(z, y, x)` is `origin + (x * sx, y * sy, z * sz)`.
/// Dimensions and spacing are fixed at construction; only the intensities
/// can be changed afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct VoxelGrid {
    data: Array3<f32>,
    spacing: Vector3<f64>,
    origin: Point3<f64>,
}

impl VoxelGrid {
    pub fn new(data: Array3<f32>, spacing: Vector3<f64>, origin: Point3<f64>) -> Result<Self> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ViewerError::InvalidParameter(format!(
                "spacing must be positive, got ({}, {}, {})",
                spacing.x, spacing.y, spacing.z
            )));
        }
        if data.is_empty() {
            return Err(ViewerError::InvalidParameter(
                "voxel grid must not be empty".to_string(),
            ));
        }
        Ok(Self {
            data,
            spacing,
            origin,
        })
    }

    /// Stack an ordered series of 2D slices (`(height, width)` each) into a grid.
    pub fn from_slices(
        slices: &[Array2<f32>],
        spacing: Vector3<f64>,
        origin: Point3<f64>,
    ) -> Result<Self> {
        let first = slices.first().ok_or_else(|| {
            ViewerError::InvalidParameter("at least one slice is required".to_string())
        })?;
        let (height, width) = first.dim();
        let mut data = Array3::<f32>::zeros((slices.len(), height, width));
        for (i, slice) in slices.iter().enumerate() {
            if slice.dim() != (height, width) {
                let (h, w) = slice.dim();
                return Err(ViewerError::DimensionMismatch {
                    expected: (slices.len(), height, width),
                    actual: (slices.len(), h, w),
                });
            }
            data.slice_mut(s![i, .., ..]).assign(slice);
        }
        Self::new(data, spacing, origin)
    }

    /// Get the dimensions of the grid (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Mutable access to the intensities. The view cannot change the shape.
    pub fn intensities_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }

    /// Swap in a freshly computed intensity block of the same shape.
    pub fn replace_intensities(&mut self, data: Array3<f32>) -> Result<()> {
        if data.dim() != self.data.dim() {
            return Err(ViewerError::DimensionMismatch {
                expected: self.data.dim(),
                actual: data.dim(),
            });
        }
        self.data = data;
        Ok(())
    }

    pub fn index_to_world(&self, index: Vector3<f64>) -> Point3<f64> {
        self.origin + index.component_mul(&self.spacing)
    }

    /// Continuous `(x, y, z)` index of a world point.
    pub fn world_to_index(&self, point: &Point3<f64>) -> Vector3<f64> {
        (point - self.origin).component_div(&self.spacing)
    }

    /// World bounds as `[xmin, xmax, ymin, ymax, zmin, zmax]`.
    pub fn bounds(&self) -> [f64; 6] {
        let (depth, height, width) = self.dim();
        let max = self.index_to_world(Vector3::new(
            (width - 1) as f64,
            (height - 1) as f64,
            (depth - 1) as f64,
        ));
        [
            self.origin.x,
            max.x,
            self.origin.y,
            max.y,
            self.origin.z,
            max.z,
        ]
    }

    pub fn center(&self) -> Point3<f64> {
        let b = self.bounds();
        Point3::new(
            0.5 * (b[0] + b[1]),
            0.5 * (b[2] + b[3]),
            0.5 * (b[4] + b[5]),
        )
    }

    /// Smallest and largest intensity in the grid.
    pub fn intensity_range(&self) -> (f32, f32) {
        self.data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn get_slice_from_axis(
        &self,
        index: usize,
        orientation: &Orientation,
    ) -> Option<ArrayView2<'_, f32>> {
        if !self.is_valid_index(index, orientation) {
            return None;
        }
        let slice_result = match orientation {
            Orientation::Axial => self.data.slice(s![index, .., ..]),
            Orientation::Coronal => self.data.slice(s![.., index, ..]),
            Orientation::Sagittal => self.data.slice(s![.., .., index]),
        };
        Some(slice_result)
    }

    pub fn is_valid_index(&self, index: usize, orientation: &Orientation) -> bool {
        let dim = self.data.dim();
        let max_index = match orientation {
            Orientation::Axial => dim.0,
            Orientation::Coronal => dim.1,
            Orientation::Sagittal => dim.2,
        };
        index < max_index
    }
}
