//! Resampling a volume onto an arbitrary, possibly oblique, plane.

use crate::enums::Interpolation;
use crate::error::Result;
use crate::geometry::{CuttingPlane, InPlaneBasis};
use crate::interpolator::Interpolator;
use crate::volume::VoxelGrid;

use image::{GrayImage, ImageBuffer, Luma};
use log::debug;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Samples outside the volume take this value.
pub const BACKGROUND: f32 = 0.0;

/// Slack, in voxels, before a sample counts as outside the volume.
const BOUNDS_TOLERANCE: f64 = 1e-6;

/// A 2D raster `(height, width)` with the window/level used to display it.
#[derive(Clone, Debug, PartialEq)]
pub struct ReslicedImage {
    pub pixels: Array2<f32>,
    pub window: f32,
    pub level: f32,
}

impl ReslicedImage {
    /// (width, height)
    pub fn size(&self) -> (usize, usize) {
        let (height, width) = self.pixels.dim();
        (width, height)
    }

    #[inline]
    fn window_to_u8(&self, value: f32) -> u8 {
        let width = self.window.max(f32::EPSILON);
        let low = self.level - width / 2.0;
        (((value - low) / width) * 255.0).clamp(0.0, 255.0) as u8
    }

    /// Map the raster through window/level onto 8-bit grey, row 0 at the top.
    pub fn to_image(&self) -> Option<GrayImage> {
        let (width, height) = self.size();
        let pixel_data: Vec<u8> = self
            .pixels
            .iter()
            .map(|&v| self.window_to_u8(v))
            .collect();
        ImageBuffer::<Luma<u8>, Vec<u8>>::from_raw(width as u32, height as u32, pixel_data)
    }
}

/// Resample `grid` on `plane`.
///
/// The output is `width x height` of the grid's x/y size, centred on the
/// plane origin, stepping one x-spacing along `tangent1` per column and one
/// y-spacing along `tangent2` per row.
pub fn reslice(
    grid: &VoxelGrid,
    plane: &CuttingPlane,
    interpolation: Interpolation,
    window: f32,
    level: f32,
) -> Result<ReslicedImage> {
    let basis = plane.basis()?;
    let (_, height, width) = grid.dim();
    let pixels = sample_plane(grid, plane, &basis, width, height, interpolation);
    Ok(ReslicedImage {
        pixels,
        window,
        level,
    })
}

fn sample_plane(
    grid: &VoxelGrid,
    plane: &CuttingPlane,
    basis: &InPlaneBasis,
    width: usize,
    height: usize,
    interpolation: Interpolation,
) -> Array2<f32> {
    let spacing = grid.spacing();
    let volume = grid.data();
    let (depth, rows, cols) = grid.dim();
    let max_index = [
        (cols - 1) as f64,
        (rows - 1) as f64,
        (depth - 1) as f64,
    ];
    let step_u = basis.tangent1.into_inner() * spacing.x;
    let step_v = basis.tangent2.into_inner() * spacing.y;
    let half_u = (width as f64 - 1.0) / 2.0;
    let half_v = (height as f64 - 1.0) / 2.0;

    let mut pixels = Array2::<f32>::zeros((height, width));
    pixels
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(v, mut row)| {
            let row_origin = plane.origin + step_v * (v as f64 - half_v);
            for (u, pixel) in row.iter_mut().enumerate() {
                let world = row_origin + step_u * (u as f64 - half_u);
                let index = grid.world_to_index(&world);
                let inside = index
                    .iter()
                    .zip(max_index.iter())
                    .all(|(&i, &max)| i >= -BOUNDS_TOLERANCE && i <= max + BOUNDS_TOLERANCE);
                if !inside {
                    *pixel = BACKGROUND;
                    continue;
                }
                let x = index.x.clamp(0.0, max_index[0]) as f32;
                let y = index.y.clamp(0.0, max_index[1]) as f32;
                let z = index.z.clamp(0.0, max_index[2]) as f32;
                *pixel = match interpolation {
                    Interpolation::Trilinear => {
                        Interpolator::trilinear_interpolate(&volume, z, y, x)
                    }
                    Interpolation::Nearest => Interpolator::nearest(&volume, z, y, x),
                };
            }
        });
    pixels
}

/// Keeps the last slice and recomputes only when the plane or the grid
/// version changed.
#[derive(Debug)]
pub struct Reslicer {
    interpolation: Interpolation,
    window: f32,
    level: f32,
    cached: Option<(CuttingPlane, u64, ReslicedImage)>,
}

impl Reslicer {
    pub fn new(interpolation: Interpolation, window: f32, level: f32) -> Self {
        Self {
            interpolation,
            window,
            level,
            cached: None,
        }
    }

    pub fn reslice(
        &mut self,
        grid: &VoxelGrid,
        grid_version: u64,
        plane: &CuttingPlane,
    ) -> Result<&ReslicedImage> {
        let entry = match self.cached.take() {
            Some(entry) if entry.0 == *plane && entry.1 == grid_version => {
                debug!("Reslice cache hit (grid version {grid_version})");
                entry
            }
            stale => match reslice(grid, plane, self.interpolation, self.window, self.level) {
                Ok(image) => {
                    debug!(
                        "Resliced {:?} at {:?} (grid version {grid_version})",
                        image.size(),
                        plane.origin
                    );
                    (*plane, grid_version, image)
                }
                Err(err) => {
                    self.cached = stale;
                    return Err(err);
                }
            },
        };
        Ok(&self.cached.insert(entry).2)
    }

    /// The most recent slice, if one was ever computed.
    pub fn last(&self) -> Option<&ReslicedImage> {
        self.cached.as_ref().map(|(_, _, image)| image)
    }

    pub fn set_window_level(&mut self, window: f32, level: f32) {
        self.window = window;
        self.level = level;
        if let Some((_, _, image)) = &mut self.cached {
            image.window = window;
            image.level = level;
        }
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        if self.interpolation != interpolation {
            self.interpolation = interpolation;
            self.cached = None;
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }
}
