//! The image-space transforms of the filter chain: median denoise,
//! edge-preserving anisotropic diffusion and 3x3 convolution sharpening.

use crate::enums::Connectivity;
use crate::error::{Result, ViewerError};

use ndarray::{Array3, ArrayView3, Axis, Zip, s};
use rayon::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag that aborts a running filter pass between slices.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(ViewerError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Neighbourhood median; kernel sizes are `(x, y, z)` and always odd.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MedianParams {
    kernel_size: [usize; 3],
}

impl MedianParams {
    /// Per-axis kernel sizes. Even sizes are bumped to the next odd value.
    pub fn new(x: i64, y: i64, z: i64) -> Result<Self> {
        Ok(Self {
            kernel_size: [
                Self::odd_kernel(x)?,
                Self::odd_kernel(y)?,
                Self::odd_kernel(z)?,
            ],
        })
    }

    pub fn uniform(size: i64) -> Result<Self> {
        Self::new(size, size, size)
    }

    pub fn kernel_size(&self) -> [usize; 3] {
        self.kernel_size
    }

    fn odd_kernel(size: i64) -> Result<usize> {
        if size < 1 {
            return Err(ViewerError::InvalidParameter(format!(
                "kernel size must be positive, got {size}"
            )));
        }
        let size = size as usize;
        Ok(if size % 2 == 0 { size + 1 } else { size })
    }
}

impl Default for MedianParams {
    fn default() -> Self {
        Self {
            kernel_size: [3, 3, 3],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiffusionParams {
    iterations: u32,
    diffusion_factor: f32,
    threshold: f32,
    connectivity: Connectivity,
}

impl DiffusionParams {
    pub fn new(iterations: i64, diffusion_factor: f32, threshold: f32) -> Result<Self> {
        if iterations < 0 || iterations > u32::MAX as i64 {
            return Err(ViewerError::InvalidParameter(format!(
                "iteration count must be non-negative, got {iterations}"
            )));
        }
        if !diffusion_factor.is_finite() || !threshold.is_finite() || threshold < 0.0 {
            return Err(ViewerError::InvalidParameter(format!(
                "diffusion factor {diffusion_factor} / threshold {threshold} out of range"
            )));
        }
        Ok(Self {
            iterations: iterations as u32,
            diffusion_factor,
            threshold,
            connectivity: Connectivity::default(),
        })
    }

    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn diffusion_factor(&self) -> f32 {
        self.diffusion_factor
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }
}

impl Default for DiffusionParams {
    fn default() -> Self {
        Self {
            iterations: 1,
            diffusion_factor: 1.0,
            threshold: 0.1,
            connectivity: Connectivity::default(),
        }
    }
}

/// Row-major 3x3 weights, applied to each axial slice.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SharpenParams {
    kernel: [[f32; 3]; 3],
}

impl SharpenParams {
    pub const IDENTITY: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];

    pub fn new(kernel: [[f32; 3]; 3]) -> Result<Self> {
        if kernel.iter().flatten().any(|w| !w.is_finite()) {
            return Err(ViewerError::InvalidParameter(
                "sharpening kernel must be finite".to_string(),
            ));
        }
        Ok(Self { kernel })
    }

    /// Laplacian sharpening: `center = 1 + 4s`, edges `-s`, corners `0`.
    pub fn from_strength(strength: f32) -> Result<Self> {
        let s = strength;
        Self::new([[0.0, -s, 0.0], [-s, 1.0 + 4.0 * s, -s], [0.0, -s, 0.0]])
    }

    pub fn kernel(&self) -> [[f32; 3]; 3] {
        self.kernel
    }
}

impl Default for SharpenParams {
    fn default() -> Self {
        Self {
            kernel: [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]],
        }
    }
}

/// Parameters of one stage of the chain.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FilterParams {
    Denoise(MedianParams),
    Diffuse(DiffusionParams),
    Sharpen(SharpenParams),
}

impl FilterParams {
    pub fn apply(&self, input: &ArrayView3<f32>, cancel: &CancelToken) -> Result<Array3<f32>> {
        match self {
            FilterParams::Denoise(params) => median(input, params, cancel),
            FilterParams::Diffuse(params) => diffuse(input, params, cancel),
            FilterParams::Sharpen(params) => sharpen(input, params, cancel),
        }
    }
}

pub fn median(
    input: &ArrayView3<f32>,
    params: &MedianParams,
    cancel: &CancelToken,
) -> Result<Array3<f32>> {
    let [kx, ky, kz] = params.kernel_size;
    if kx == 1 && ky == 1 && kz == 1 {
        return Ok(input.to_owned());
    }
    let (depth, height, width) = input.dim();
    // a window never reaches past the grid, so radii beyond it change nothing
    let rx = (kx / 2).min(width.saturating_sub(1));
    let ry = (ky / 2).min(height.saturating_sub(1));
    let rz = (kz / 2).min(depth.saturating_sub(1));
    let capacity = (2 * rx + 1) * (2 * ry + 1) * (2 * rz + 1);
    let mut output = Array3::<f32>::zeros(input.raw_dim());

    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .try_for_each(|(z, mut out_slice)| {
            cancel.check()?;
            let z_range = z.saturating_sub(rz)..(z + rz + 1).min(depth);
            let mut window = Vec::with_capacity(capacity);
            for y in 0..height {
                let y_range = y.saturating_sub(ry)..(y + ry + 1).min(height);
                for x in 0..width {
                    let x_range = x.saturating_sub(rx)..(x + rx + 1).min(width);
                    window.clear();
                    window.extend(
                        input
                            .slice(s![z_range.clone(), y_range.clone(), x_range])
                            .iter()
                            .copied(),
                    );
                    let mid = window.len() / 2;
                    let (_, value, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
                    out_slice[[y, x]] = *value;
                }
            }
            Ok(())
        })?;

    Ok(output)
}

fn neighbour_offsets(connectivity: Connectivity) -> Vec<(isize, isize, isize)> {
    let max_manhattan = match connectivity {
        Connectivity::Faces => 1,
        Connectivity::FacesEdges => 2,
        Connectivity::Full => 3,
    };
    let mut offsets = Vec::with_capacity(26);
    for dz in -1..=1isize {
        for dy in -1..=1isize {
            for dx in -1..=1isize {
                let manhattan = dz.abs() + dy.abs() + dx.abs();
                if manhattan > 0 && manhattan <= max_manhattan {
                    offsets.push((dz, dy, dx));
                }
            }
        }
    }
    offsets
}

/// Each iteration moves a voxel towards every neighbour whose difference is
/// below the threshold, by `factor / neighbour_count` of that difference.
pub fn diffuse(
    input: &ArrayView3<f32>,
    params: &DiffusionParams,
    cancel: &CancelToken,
) -> Result<Array3<f32>> {
    let mut current = input.to_owned();
    if params.iterations == 0 {
        return Ok(current);
    }
    let offsets = neighbour_offsets(params.connectivity);
    let step = params.diffusion_factor / offsets.len() as f32;
    let (depth, height, width) = input.dim();
    let dims = [depth as isize, height as isize, width as isize];
    let mut next = current.clone();

    for _ in 0..params.iterations {
        cancel.check()?;
        Zip::indexed(&mut next)
            .and(&current)
            .par_for_each(|(z, y, x), out, &center| {
                let mut value = center;
                for &(dz, dy, dx) in &offsets {
                    let (nz, ny, nx) = (z as isize + dz, y as isize + dy, x as isize + dx);
                    if nz < 0 || ny < 0 || nx < 0 || nz >= dims[0] || ny >= dims[1] || nx >= dims[2]
                    {
                        continue;
                    }
                    let diff = current[[nz as usize, ny as usize, nx as usize]] - center;
                    if diff.abs() < params.threshold {
                        value += diff * step;
                    }
                }
                *out = value;
            });
        std::mem::swap(&mut current, &mut next);
    }

    Ok(current)
}

/// Correlate each axial slice with the 3x3 kernel, replicating edge pixels.
pub fn sharpen(
    input: &ArrayView3<f32>,
    params: &SharpenParams,
    cancel: &CancelToken,
) -> Result<Array3<f32>> {
    let (_, height, width) = input.dim();
    let kernel = params.kernel;
    let mut output = Array3::<f32>::zeros(input.raw_dim());

    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .zip(input.axis_iter(Axis(0)).into_par_iter())
        .try_for_each(|(mut out_slice, in_slice)| {
            cancel.check()?;
            for y in 0..height {
                for x in 0..width {
                    let mut sum = 0.0f32;
                    for (ky, row) in kernel.iter().enumerate() {
                        let sy = (y + ky).saturating_sub(1).min(height - 1);
                        for (kx, &weight) in row.iter().enumerate() {
                            if weight == 0.0 {
                                continue;
                            }
                            let sx = (x + kx).saturating_sub(1).min(width - 1);
                            sum = weight.mul_add(in_slice[[sy, sx]], sum);
                        }
                    }
                    out_slice[[y, x]] = sum;
                }
            }
            Ok(())
        })?;

    Ok(output)
}
