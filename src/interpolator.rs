use ndarray::{ArrayView2, ArrayView3};

pub(crate) struct Interpolator;

impl Interpolator {
    #[inline]
    pub(crate) fn bilinear_interpolate(slice: &ArrayView2<f32>, y: f32, x: f32) -> f32 {
        let (height, width) = slice.dim();

        let y0 = y.floor() as usize;
        let x0 = x.floor() as usize;
        let y1 = (y0 + 1).min(height - 1);
        let x1 = (x0 + 1).min(width - 1);

        let dy = y - y0 as f32;
        let dx = x - x0 as f32;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let v00 = slice[[y0, x0]];
        let v01 = slice[[y0, x1]];
        let v10 = slice[[y1, x0]];
        let v11 = slice[[y1, x1]];

        let v0 = v00.mul_add(one_minus_dx, v01 * dx);
        let v1 = v10.mul_add(one_minus_dx, v11 * dx);

        v0.mul_add(one_minus_dy, v1 * dy)
    }

    /// Blend the two bilinear samples of the slices bracketing `z`.
    ///
    /// Coordinates are continuous indices and must lie inside the volume.
    #[inline]
    pub(crate) fn trilinear_interpolate(volume: &ArrayView3<f32>, z: f32, y: f32, x: f32) -> f32 {
        let depth = volume.dim().0;

        let z0 = z.floor() as usize;
        let z1 = (z0 + 1).min(depth - 1);
        let dz = z - z0 as f32;

        let lower = volume.index_axis(ndarray::Axis(0), z0);
        let v0 = Self::bilinear_interpolate(&lower, y, x);
        if dz == 0.0 || z1 == z0 {
            return v0;
        }
        let upper = volume.index_axis(ndarray::Axis(0), z1);
        let v1 = Self::bilinear_interpolate(&upper, y, x);

        v0.mul_add(1.0 - dz, v1 * dz)
    }

    #[inline]
    pub(crate) fn nearest(volume: &ArrayView3<f32>, z: f32, y: f32, x: f32) -> f32 {
        let (depth, height, width) = volume.dim();
        let z = (z.round() as usize).min(depth - 1);
        let y = (y.round() as usize).min(height - 1);
        let x = (x.round() as usize).min(width - 1);
        volume[[z, y, x]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn test_bilinear_midpoint() {
        let slice = Array2::from_shape_vec((2, 2), vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let v = Interpolator::bilinear_interpolate(&slice.view(), 0.5, 0.5);
        assert!((v - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_trilinear_on_grid_points_is_exact() {
        let volume = Array3::from_shape_fn((3, 3, 3), |(z, y, x)| (z * 9 + y * 3 + x) as f32);
        for (z, y, x) in [(0, 0, 0), (1, 2, 1), (2, 2, 2)] {
            let v = Interpolator::trilinear_interpolate(&volume.view(), z as f32, y as f32, x as f32);
            assert_eq!(v, volume[[z, y, x]]);
        }
    }

    #[test]
    fn test_trilinear_is_linear_on_ramp() {
        let volume = Array3::from_shape_fn((4, 4, 4), |(z, y, x)| (z + 2 * y + 3 * x) as f32);
        let v = Interpolator::trilinear_interpolate(&volume.view(), 1.25, 0.5, 2.75);
        assert!((v - (1.25 + 1.0 + 8.25)).abs() < 1e-5);
    }

    #[test]
    fn test_nearest_rounds() {
        let volume = Array3::from_shape_fn((2, 2, 2), |(z, y, x)| (z * 4 + y * 2 + x) as f32);
        assert_eq!(Interpolator::nearest(&volume.view(), 0.6, 0.4, 0.9), 5.0);
    }
}
