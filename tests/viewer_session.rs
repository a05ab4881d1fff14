use dicom_reslice::{
    ClickOutcome, ClipBox, CuttingPlane, DiffusionParams, FilterParams, InPlaneBasis,
    MedianParams, ScreenPosition, SharpenParams, StageId, Viewer, ViewerConfig, ViewerError,
    VoxelGrid,
};
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use ndarray::{Array3, s};

fn phantom() -> VoxelGrid {
    // a bright sphere in a dim box, with one hot voxel of noise
    let mut data = Array3::from_shape_fn((9, 12, 14), |(z, y, x)| {
        let d = ((x as f32 - 6.5).powi(2) + (y as f32 - 5.5).powi(2) + (z as f32 - 4.0).powi(2))
            .sqrt();
        if d < 3.5 { 200.0 } else { 20.0 }
    });
    data[[4, 1, 1]] = 250.0;
    VoxelGrid::new(data, Vector3::new(1.0, 1.0, 2.0), Point3::new(-7.0, -6.0, 0.0)).unwrap()
}

fn identity_config() -> ViewerConfig {
    ViewerConfig {
        denoise: MedianParams::uniform(1).unwrap(),
        diffuse: DiffusionParams::new(0, 1.0, 0.1).unwrap(),
        sharpen: SharpenParams::new(SharpenParams::IDENTITY).unwrap(),
        ..ViewerConfig::default()
    }
}

fn thin_box(center: Point3<f64>, rotation: UnitQuaternion<f64>) -> Matrix4<f64> {
    *ClipBox::from_parts(center, rotation, Vector3::new(40.0, 40.0, 2.0)).transform()
}

#[test]
fn test_midplane_slice_matches_source_slice() {
    let grid = phantom();
    let expected = grid.data().slice(s![4, .., ..]).to_owned();
    let center = grid.center();
    let mut viewer = Viewer::new(grid, identity_config()).unwrap();

    viewer
        .on_interaction_update(thin_box(center, UnitQuaternion::identity()))
        .unwrap();
    let slice = viewer.display_slice().unwrap();
    assert_eq!(slice.size(), (14, 12));
    for (got, want) in slice.pixels.iter().zip(expected.iter()) {
        assert!((got - want).abs() < 1e-3);
    }
    assert!(viewer.slice_visible());
}

#[test]
fn test_planarity_examples() {
    let flat = ClipBox::from_parts(Point3::origin(), UnitQuaternion::identity(), Vector3::new(50.0, 50.0, 5.0));
    let cube = ClipBox::from_parts(Point3::origin(), UnitQuaternion::identity(), Vector3::new(50.0, 50.0, 50.0));
    assert!(flat.is_planar(10.0));
    assert!(!cube.is_planar(10.0));
}

#[test]
fn test_oblique_box_gives_orthonormal_slice_frame() {
    let rotation = UnitQuaternion::from_euler_angles(0.4, -0.25, 1.1);
    let grid = phantom();
    let center = grid.center();
    let mut viewer = Viewer::new(grid, identity_config()).unwrap();
    viewer.on_interaction_update(thin_box(center, rotation)).unwrap();

    let plane = viewer.clip_box().cutting_plane().unwrap();
    let expected_normal = rotation * Vector3::z();
    assert!((plane.normal.into_inner() - expected_normal).norm() < 1e-12);

    let basis = InPlaneBasis::from_normal(&plane.normal).unwrap();
    let (t1, t2, n) = (
        basis.tangent1.into_inner(),
        basis.tangent2.into_inner(),
        plane.normal.into_inner(),
    );
    assert!(t1.dot(&t2).abs() < 1e-12);
    assert!((t1.dot(&t2.cross(&n)) - 1.0).abs() < 1e-12);

    // the slice centre lands on the sphere
    let slice = viewer.extract_slice().unwrap();
    let (width, height) = slice.size();
    let centre_value = slice.pixels[[height / 2, width / 2]];
    assert!(centre_value > 100.0, "centre sample {centre_value}");
}

#[test]
fn test_slice_follows_filter_changes_without_moving_box() {
    let grid = phantom();
    let center = grid.center();
    let mut viewer = Viewer::new(grid, identity_config()).unwrap();
    viewer
        .on_interaction_update(thin_box(center, UnitQuaternion::identity()))
        .unwrap();

    let before = viewer.extract_slice().unwrap().clone();
    assert_eq!(before.pixels[[1, 1]], 250.0);
    let version = viewer.pipeline().output_version();

    // unchanged inputs: the same slice and no new pipeline work
    let again = viewer.extract_slice().unwrap().clone();
    assert_eq!(again, before);
    assert_eq!(viewer.pipeline().output_version(), version);

    viewer.set_median_kernel(2).unwrap();
    let after = viewer.extract_slice().unwrap().clone();
    assert!(viewer.pipeline().output_version() > version);
    assert_eq!(after.pixels[[1, 1]], 20.0);
}

#[test]
fn test_rejected_parameters_change_nothing() {
    let mut viewer = Viewer::new(phantom(), identity_config()).unwrap();
    viewer.render_volume().unwrap();
    let version = viewer.pipeline().output_version();

    assert!(matches!(
        viewer.on_parameter_change(
            StageId::Sharpen,
            FilterParams::Diffuse(DiffusionParams::default())
        ),
        Err(ViewerError::InvalidParameter(_))
    ));
    assert!(viewer.set_diffusion_iterations(-1).is_err());
    assert!(viewer.set_median_kernel(-3).is_err());

    let (_, after) = viewer.render_volume().unwrap();
    assert_eq!(after, version);
}

#[test]
fn test_default_chain_keeps_geometry() {
    let grid = phantom();
    let (dim, spacing, origin) = (grid.dim(), grid.spacing(), grid.origin());
    let mut viewer = Viewer::new(grid, ViewerConfig::default()).unwrap();
    let (output, _) = viewer.render_volume().unwrap();
    assert_eq!(output.dim(), dim);
    assert_eq!(output.spacing(), spacing);
    assert_eq!(output.origin(), origin);
}

#[test]
fn test_clip_planes_track_the_box() {
    let grid = phantom();
    let center = grid.center();
    let mut viewer = Viewer::new(grid, identity_config()).unwrap();
    assert!(viewer.clip_planes().iter().all(|p| p.contains(&center)));

    let moved = Point3::new(100.0, 0.0, 0.0);
    viewer
        .on_interaction_update(thin_box(moved, UnitQuaternion::identity()))
        .unwrap();
    assert!(viewer.clip_planes().iter().all(|p| p.contains(&moved)));
    assert!(!viewer.clip_planes().iter().all(|p| p.contains(&center)));
}

#[test]
fn test_toggle_slice_view() {
    let grid = phantom();
    let center = grid.center();
    let mut viewer = Viewer::new(grid, identity_config()).unwrap();
    viewer
        .on_interaction_update(thin_box(center, UnitQuaternion::identity()))
        .unwrap();

    assert!(viewer.toggle_slice_view().unwrap());
    assert!(viewer.current_slice().is_some());
    assert!(!viewer.toggle_slice_view().unwrap());
    assert!(viewer.toggle_slice_view().unwrap());
}

#[test]
fn test_annotations_in_click_order() {
    let mut viewer = Viewer::new(phantom(), identity_config()).unwrap();
    for (text, x) in [("A", 10), ("B", 20)] {
        viewer.arm_annotation(text).unwrap();
        assert!(matches!(
            viewer.on_left_click(ScreenPosition::new(x, 5)),
            ClickOutcome::Annotated(_)
        ));
    }
    assert_eq!(viewer.arm_annotation(""), Err(ViewerError::EmptyAnnotationText));
    assert_eq!(
        viewer.on_left_click(ScreenPosition::new(30, 5)),
        ClickOutcome::CameraInteraction
    );

    let texts: Vec<_> = viewer.annotations().iter().map(|a| a.text()).collect();
    assert_eq!(texts, ["A", "B"]);
}

#[test]
fn test_plane_outside_volume_is_background() {
    let grid = phantom();
    let mut far = grid.center();
    far.z += 500.0;
    let plane = CuttingPlane::new(far, Vector3::z()).unwrap();
    let image = dicom_reslice::reslice::reslice(
        &grid,
        &plane,
        dicom_reslice::Interpolation::Trilinear,
        255.0,
        127.5,
    )
    .unwrap();
    assert!(image.pixels.iter().all(|&v| v == 0.0));
}
