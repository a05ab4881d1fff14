//! Cutting planes derived from box transforms, and the in-plane frames
//! used to sample them.

use crate::enums::Orientation;
use crate::error::{Result, ViewerError};
use crate::volume::VoxelGrid;

use nalgebra::{Matrix4, Point3, Unit, Vector3};

/// Lengths below this are treated as zero.
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// A plane through `origin` with unit `normal`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CuttingPlane {
    pub origin: Point3<f64>,
    pub normal: Unit<Vector3<f64>>,
}

/// Two unit tangents spanning a plane; `{tangent1, tangent2, normal}` is a
/// right-handed orthonormal frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InPlaneBasis {
    pub tangent1: Unit<Vector3<f64>>,
    pub tangent2: Unit<Vector3<f64>>,
}

impl CuttingPlane {
    pub fn new(origin: Point3<f64>, normal: Vector3<f64>) -> Result<Self> {
        if !origin.coords.iter().chain(normal.iter()).all(|v| v.is_finite()) {
            return Err(ViewerError::DegenerateGeometry);
        }
        let normal =
            Unit::try_new(normal, GEOMETRY_EPSILON).ok_or(ViewerError::DegenerateGeometry)?;
        Ok(Self { origin, normal })
    }

    /// The plane a box transform cuts along: the image of the world origin,
    /// facing along the transform's rotated Z axis.
    pub fn from_transform(transform: &Matrix4<f64>) -> Result<Self> {
        let origin = transform.transform_point(&Point3::origin());
        let normal: Vector3<f64> = transform.fixed_view::<3, 1>(0, 2).into_owned();
        Self::new(origin, normal)
    }

    /// The plane through grid slice `index` along one of the patient axes.
    pub fn from_orientation(
        grid: &VoxelGrid,
        orientation: Orientation,
        index: usize,
    ) -> Result<Self> {
        if !grid.is_valid_index(index, &orientation) {
            return Err(ViewerError::InvalidParameter(format!(
                "slice index {index} is outside the {orientation:?} range"
            )));
        }
        let center = grid.center();
        let at = grid.index_to_world(Vector3::repeat(index as f64));
        let (origin, normal) = match orientation {
            Orientation::Axial => (Point3::new(center.x, center.y, at.z), Vector3::z()),
            Orientation::Coronal => (Point3::new(center.x, at.y, center.z), Vector3::y()),
            Orientation::Sagittal => (Point3::new(at.x, center.y, center.z), Vector3::x()),
        };
        Self::new(origin, normal)
    }

    /// Signed distance from the plane, positive on the side the normal faces.
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        (point - self.origin).dot(self.normal.as_ref())
    }

    pub fn basis(&self) -> Result<InPlaneBasis> {
        InPlaneBasis::from_normal(&self.normal)
    }
}

impl InPlaneBasis {
    /// Build the tangents for `normal`.
    ///
    /// The reference direction is world Y, or world X when the normal has no
    /// X/Y component or is parallel to Y. The cross products are taken in the
    /// order `t2 = n x ref`, `t1 = t2 x n`; swapping them flips handedness.
    pub fn from_normal(normal: &Vector3<f64>) -> Result<Self> {
        if !normal.iter().all(|v| v.is_finite()) {
            return Err(ViewerError::DegenerateGeometry);
        }
        let normal =
            Unit::try_new(*normal, GEOMETRY_EPSILON).ok_or(ViewerError::DegenerateGeometry)?;

        let reference = if normal.x == 0.0 && normal.y == 0.0 {
            Vector3::x()
        } else {
            Vector3::y()
        };
        let tangent2 = Unit::try_new(normal.cross(&reference), GEOMETRY_EPSILON)
            .or_else(|| Unit::try_new(normal.cross(&Vector3::x()), GEOMETRY_EPSILON))
            .ok_or(ViewerError::DegenerateGeometry)?;
        let tangent1 = Unit::try_new(tangent2.cross(normal.as_ref()), GEOMETRY_EPSILON)
            .ok_or(ViewerError::DegenerateGeometry)?;

        Ok(Self { tangent1, tangent2 })
    }
}
