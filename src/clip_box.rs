//! The manipulable box that clips the rendered volume and selects the slice.

use crate::error::{Result, ViewerError};
use crate::geometry::{CuttingPlane, GEOMETRY_EPSILON};

use nalgebra::{Matrix3, Matrix4, Point3, Unit, UnitQuaternion, Vector3};

/// Geometry on the side the normal points to is discarded.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfSpace {
    pub origin: Point3<f64>,
    pub normal: Unit<Vector3<f64>>,
}

impl HalfSpace {
    /// True when `point` is kept by this half-space.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        (point - self.origin).dot(self.normal.as_ref()) <= GEOMETRY_EPSILON
    }
}

/// An oriented box given by the affine transform that maps the unit cube
/// `[-0.5, 0.5]^3` onto it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipBox {
    transform: Matrix4<f64>,
}

impl ClipBox {
    /// An axis-aligned box covering `bounds` (`[xmin, xmax, ymin, ymax, zmin, zmax]`).
    pub fn place(bounds: [f64; 6]) -> Self {
        let center = Vector3::new(
            0.5 * (bounds[0] + bounds[1]),
            0.5 * (bounds[2] + bounds[3]),
            0.5 * (bounds[4] + bounds[5]),
        );
        let extents = Vector3::new(
            (bounds[1] - bounds[0]).abs(),
            (bounds[3] - bounds[2]).abs(),
            (bounds[5] - bounds[4]).abs(),
        );
        Self::from_parts(center.into(), UnitQuaternion::identity(), extents)
    }

    /// Box centred at `center`, rotated by `rotation`, with edge lengths `extents`
    /// along its own axes.
    pub fn from_parts(
        center: Point3<f64>,
        rotation: UnitQuaternion<f64>,
        extents: Vector3<f64>,
    ) -> Self {
        let transform = Matrix4::new_translation(&center.coords)
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&extents);
        Self { transform }
    }

    pub fn from_transform(transform: Matrix4<f64>) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> &Matrix4<f64> {
        &self.transform
    }

    fn axis(&self, i: usize) -> Vector3<f64> {
        self.transform.fixed_view::<3, 1>(0, i).into_owned()
    }

    pub fn center(&self) -> Point3<f64> {
        self.transform.transform_point(&Point3::origin())
    }

    /// Edge lengths along the box's own three axes.
    pub fn local_extents(&self) -> Vector3<f64> {
        Vector3::new(self.axis(0).norm(), self.axis(1).norm(), self.axis(2).norm())
    }

    /// True iff at least one local extent is below `threshold_width`.
    pub fn is_planar(&self, threshold_width: f64) -> bool {
        self.local_extents().iter().any(|&e| e < threshold_width)
    }

    /// The plane through the box centre, normal to its local Z axis.
    pub fn cutting_plane(&self) -> Result<CuttingPlane> {
        CuttingPlane::from_transform(&self.transform)
    }

    /// The six face half-spaces, outward normals, in the order
    /// `-x, +x, -y, +y, -z, +z` of the box's local axes.
    pub fn half_spaces(&self) -> Result<[HalfSpace; 6]> {
        if !self.transform.iter().all(|v| v.is_finite()) {
            return Err(ViewerError::DegenerateGeometry);
        }
        let linear: Matrix3<f64> = self.transform.fixed_view::<3, 3>(0, 0).into_owned();
        let det = linear.determinant();
        if det.abs() <= GEOMETRY_EPSILON {
            return Err(ViewerError::DegenerateGeometry);
        }
        // inverse-transpose keeps face normals perpendicular under shear
        let normal_matrix = linear
            .try_inverse()
            .ok_or(ViewerError::DegenerateGeometry)?
            .transpose();

        let mut planes = Vec::with_capacity(6);
        for i in 0..3 {
            let mut local = Vector3::zeros();
            local[i] = 1.0;
            let outward = normal_matrix * local;
            for sign in [-1.0, 1.0] {
                let normal = Unit::try_new(outward * sign, GEOMETRY_EPSILON)
                    .ok_or(ViewerError::DegenerateGeometry)?;
                let origin = self.transform.transform_point(&Point3::from(local * 0.5 * sign));
                planes.push(HalfSpace { origin, normal });
            }
        }
        planes
            .try_into()
            .map_err(|_| ViewerError::DegenerateGeometry)
    }

    pub fn contains(&self, point: &Point3<f64>) -> bool {
        self.half_spaces()
            .map(|planes| planes.iter().all(|p| p.contains(point)))
            .unwrap_or(false)
    }
}
