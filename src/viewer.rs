//! One viewing session: the filter chain, the clip box, the slice view and
//! the annotations, driven by plain calls from the UI layer.

use crate::annotation::{AnnotationStore, Rgb, ScreenPosition};
use crate::clip_box::{ClipBox, HalfSpace};
use crate::config::{ViewerConfig, check_planarity_threshold};
use crate::enums::{InteractionMode, StageId};
use crate::error::{Result, ViewerError};
use crate::filter::{CancelToken, DiffusionParams, FilterParams, MedianParams, SharpenParams};
use crate::pipeline::FilterPipeline;
use crate::reslice::{ReslicedImage, Reslicer};
use crate::transfer_function::TransferFunction;
use crate::volume::VoxelGrid;

use log::{debug, info, warn};
use nalgebra::Matrix4;

/// What a left click ended up doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// An annotation was placed; index into the store.
    Annotated(usize),
    /// Not armed: the toolkit's default camera handling applies.
    CameraInteraction,
}

#[derive(Debug)]
pub struct Viewer {
    pipeline: FilterPipeline,
    clip_box: ClipBox,
    clip_planes: [HalfSpace; 6],
    planarity_threshold: f64,
    reslicer: Reslicer,
    slice_visible: bool,
    annotations: AnnotationStore,
    annotation_color: Rgb,
    mode: InteractionMode,
    pending_annotation: Option<String>,
    transfer_function: TransferFunction,
}

impl Viewer {
    /// Start a session on a loaded volume. The clip box is placed around the
    /// voxel footprints of the whole grid.
    pub fn new(grid: VoxelGrid, config: ViewerConfig) -> Result<Self> {
        config.validate()?;
        let clip_box = ClipBox::place(footprint_bounds(&grid));
        let clip_planes = clip_box.half_spaces()?;
        info!(
            "Viewer session on {:?} voxels, spacing {:?}",
            grid.dim(),
            grid.spacing()
        );

        Ok(Self {
            pipeline: FilterPipeline::new(grid, config.denoise, config.diffuse, config.sharpen),
            clip_box,
            clip_planes,
            planarity_threshold: config.planarity_threshold,
            reslicer: Reslicer::new(config.interpolation, config.slice_window, config.slice_level),
            slice_visible: false,
            annotations: AnnotationStore::new(),
            annotation_color: config.annotation_color,
            mode: InteractionMode::Normal,
            pending_annotation: None,
            transfer_function: config.transfer_function,
        })
    }

    pub fn pipeline(&self) -> &FilterPipeline {
        &self.pipeline
    }

    pub fn clip_box(&self) -> &ClipBox {
        &self.clip_box
    }

    /// The clip set currently applied to the 3D render.
    pub fn clip_planes(&self) -> &[HalfSpace; 6] {
        &self.clip_planes
    }

    pub fn transfer_function(&self) -> &TransferFunction {
        &self.transfer_function
    }

    /// The box widget moved. A degenerate transform is rejected and the
    /// previous box stays in place.
    pub fn on_interaction_update(&mut self, transform: Matrix4<f64>) -> Result<&[HalfSpace; 6]> {
        let clip_box = ClipBox::from_transform(transform);
        match clip_box.half_spaces() {
            Ok(planes) => {
                self.clip_box = clip_box;
                self.clip_planes = planes;
                debug!("Clip box extents {:?}", clip_box.local_extents());
                Ok(&self.clip_planes)
            }
            Err(err) => {
                warn!("Ignoring degenerate clip box transform");
                Err(err)
            }
        }
    }

    pub fn on_parameter_change(&mut self, stage: StageId, params: FilterParams) -> Result<()> {
        self.pipeline.set_parameters(stage, params)
    }

    /// Median kernel field; even sizes become the next odd size.
    pub fn set_median_kernel(&mut self, size: i64) -> Result<usize> {
        let params = MedianParams::uniform(size)?;
        self.on_parameter_change(StageId::Denoise, FilterParams::Denoise(params))?;
        Ok(params.kernel_size()[0])
    }

    pub fn set_diffusion_iterations(&mut self, iterations: i64) -> Result<()> {
        let current = match self.pipeline.params(StageId::Diffuse) {
            FilterParams::Diffuse(params) => params,
            _ => DiffusionParams::default(),
        };
        let params = DiffusionParams::new(
            iterations,
            current.diffusion_factor(),
            current.threshold(),
        )?
        .with_connectivity(current.connectivity());
        self.on_parameter_change(StageId::Diffuse, FilterParams::Diffuse(params))
    }

    pub fn set_sharpen_strength(&mut self, strength: f32) -> Result<()> {
        let params = SharpenParams::from_strength(strength)?;
        self.on_parameter_change(StageId::Sharpen, FilterParams::Sharpen(params))
    }

    /// Bounding-box width slider, 1 to 100.
    pub fn set_planarity_threshold(&mut self, threshold: f64) -> Result<()> {
        self.planarity_threshold = check_planarity_threshold(threshold)?;
        Ok(())
    }

    pub fn planarity_threshold(&self) -> f64 {
        self.planarity_threshold
    }

    pub fn is_planar(&self) -> bool {
        self.clip_box.is_planar(self.planarity_threshold)
    }

    /// Filtered volume for the renderer, with its version.
    pub fn render_volume(&mut self) -> Result<(&VoxelGrid, u64)> {
        self.pipeline
            .evaluate_versioned(StageId::Sharpen, &CancelToken::new())
    }

    pub fn extract_slice(&mut self) -> Result<&ReslicedImage> {
        self.extract_slice_with(&CancelToken::new())
    }

    /// Reslice the filtered volume along the clip box's plane.
    ///
    /// Only applies while the box is planar; otherwise nothing changes and
    /// [`ViewerError::NotPlanar`] is returned.
    pub fn extract_slice_with(&mut self, cancel: &CancelToken) -> Result<&ReslicedImage> {
        if !self.is_planar() {
            warn!(
                "Slice requested but box extents {:?} are all >= {}",
                self.clip_box.local_extents(),
                self.planarity_threshold
            );
            return Err(ViewerError::NotPlanar);
        }
        let plane = self.clip_box.cutting_plane()?;
        let (grid, version) = self.pipeline.evaluate_versioned(StageId::Sharpen, cancel)?;
        self.reslicer.reslice(grid, version, &plane)
    }

    /// "Display slice": extract and show the slice view.
    pub fn display_slice(&mut self) -> Result<&ReslicedImage> {
        self.extract_slice()?;
        self.slice_visible = true;
        self.current_slice().ok_or(ViewerError::NotPlanar)
    }

    /// Flip slice visibility. Showing refreshes the slice while the box is
    /// planar and otherwise re-shows the last one; with no slice at all it
    /// needs a planar box.
    pub fn toggle_slice_view(&mut self) -> Result<bool> {
        if self.slice_visible {
            self.slice_visible = false;
        } else if self.is_planar() || self.reslicer.last().is_none() {
            self.display_slice()?;
        } else {
            debug!("Box is not planar, showing the previous slice");
            self.slice_visible = true;
        }
        Ok(self.slice_visible)
    }

    pub fn slice_visible(&self) -> bool {
        self.slice_visible
    }

    pub fn current_slice(&self) -> Option<&ReslicedImage> {
        self.reslicer.last()
    }

    pub fn set_window_level(&mut self, window: f32, level: f32) -> Result<()> {
        if !window.is_finite() || window <= 0.0 || !level.is_finite() {
            return Err(ViewerError::InvalidParameter(format!(
                "window {window} / level {level} out of range"
            )));
        }
        self.reslicer.set_window_level(window, level);
        Ok(())
    }

    /// Store the text for the next click and arm annotation mode.
    pub fn arm_annotation(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ViewerError::EmptyAnnotationText);
        }
        self.pending_annotation = Some(text.to_string());
        self.mode = InteractionMode::AnnotateArmed;
        Ok(())
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn pending_annotation(&self) -> Option<&str> {
        self.pending_annotation.as_deref()
    }

    /// Left button pressed at `position`. When armed, the pending text is
    /// consumed and the mode returns to normal.
    pub fn on_left_click(&mut self, position: ScreenPosition) -> ClickOutcome {
        if self.mode != InteractionMode::AnnotateArmed {
            return ClickOutcome::CameraInteraction;
        }
        self.mode = InteractionMode::Normal;
        let Some(text) = self.pending_annotation.take() else {
            return ClickOutcome::CameraInteraction;
        };
        match self
            .annotations
            .add_with_color(&text, position, self.annotation_color)
        {
            Ok(annotation) => {
                debug!("Annotation {:?} at {:?}", annotation.text(), position);
                ClickOutcome::Annotated(self.annotations.len() - 1)
            }
            Err(err) => {
                warn!("Dropped annotation: {err}");
                ClickOutcome::CameraInteraction
            }
        }
    }

    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }
}

/// Grid bounds grown by half a voxel on every side, so a single-slice
/// volume still yields a box with volume.
fn footprint_bounds(grid: &VoxelGrid) -> [f64; 6] {
    let b = grid.bounds();
    let half = grid.spacing() * 0.5;
    [
        b[0] - half.x,
        b[1] + half.x,
        b[2] - half.y,
        b[3] + half.y,
        b[4] - half.z,
        b[5] + half.z,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, UnitQuaternion, Vector3};
    use ndarray::Array3;

    fn viewer() -> Viewer {
        let data = Array3::from_shape_fn((4, 5, 6), |(z, y, x)| (z * 10 + y + x) as f32);
        let grid = VoxelGrid::new(data, Vector3::repeat(1.0), Point3::origin()).unwrap();
        Viewer::new(grid, ViewerConfig::default()).unwrap()
    }

    #[test]
    fn test_initial_box_covers_volume() {
        let viewer = viewer();
        assert_eq!(viewer.clip_box().local_extents(), Vector3::new(6.0, 5.0, 4.0));
        assert!(viewer.is_planar());
        assert!(!viewer.slice_visible());
        assert!(viewer.current_slice().is_none());
    }

    #[test]
    fn test_degenerate_interaction_keeps_previous_box() {
        let mut viewer = viewer();
        let before = *viewer.clip_box();
        let result = viewer.on_interaction_update(Matrix4::zeros());
        assert_eq!(result.err(), Some(ViewerError::DegenerateGeometry));
        assert_eq!(viewer.clip_box(), &before);
    }

    #[test]
    fn test_non_finite_interaction_keeps_previous_box() {
        let mut viewer = viewer();
        let before = *viewer.clip_box();
        let planes = *viewer.clip_planes();
        let mut transform = Matrix4::identity();
        transform[(0, 3)] = f64::NAN;
        let result = viewer.on_interaction_update(transform);
        assert_eq!(result.err(), Some(ViewerError::DegenerateGeometry));
        assert_eq!(viewer.clip_box(), &before);
        assert_eq!(viewer.clip_planes(), &planes);
    }

    #[test]
    fn test_slice_refused_for_thick_box() {
        let mut viewer = viewer();
        let big = ClipBox::from_parts(
            Point3::new(2.5, 2.0, 1.5),
            UnitQuaternion::identity(),
            Vector3::new(50.0, 50.0, 50.0),
        );
        viewer.on_interaction_update(*big.transform()).unwrap();
        assert_eq!(viewer.extract_slice().err(), Some(ViewerError::NotPlanar));
        assert!(viewer.current_slice().is_none());
        assert!(viewer.toggle_slice_view().is_err());
        assert!(!viewer.slice_visible());
    }

    #[test]
    fn test_toggle_reshows_last_slice_after_box_thickens() {
        let mut viewer = viewer();
        let slice = viewer.display_slice().unwrap().clone();
        assert!(!viewer.toggle_slice_view().unwrap());

        let big = ClipBox::from_parts(
            Point3::new(2.5, 2.0, 1.5),
            UnitQuaternion::identity(),
            Vector3::new(50.0, 50.0, 50.0),
        );
        viewer.on_interaction_update(*big.transform()).unwrap();
        assert!(!viewer.is_planar());
        assert!(viewer.toggle_slice_view().unwrap());
        assert_eq!(viewer.current_slice(), Some(&slice));
    }

    #[test]
    fn test_median_kernel_field_is_made_odd() {
        let mut viewer = viewer();
        assert_eq!(viewer.set_median_kernel(4).unwrap(), 5);
        assert_eq!(
            viewer.pipeline().params(StageId::Denoise),
            FilterParams::Denoise(MedianParams::uniform(5).unwrap())
        );
        assert!(viewer.set_median_kernel(0).is_err());
        assert!(viewer.set_diffusion_iterations(-2).is_err());
    }

    #[test]
    fn test_diffusion_iterations_keep_factor_and_threshold() {
        let mut viewer = viewer();
        viewer.set_diffusion_iterations(4).unwrap();
        match viewer.pipeline().params(StageId::Diffuse) {
            FilterParams::Diffuse(params) => {
                assert_eq!(params.iterations(), 4);
                assert_eq!(params.diffusion_factor(), 1.0);
                assert_eq!(params.threshold(), 0.1);
            }
            other => panic!("unexpected parameters {other:?}"),
        }
    }

    #[test]
    fn test_annotation_click_flow() {
        let mut viewer = viewer();
        assert_eq!(
            viewer.on_left_click(ScreenPosition::new(1, 1)),
            ClickOutcome::CameraInteraction
        );
        assert_eq!(viewer.arm_annotation("  "), Err(ViewerError::EmptyAnnotationText));
        assert_eq!(viewer.mode(), InteractionMode::Normal);

        viewer.arm_annotation("vessel").unwrap();
        assert_eq!(viewer.mode(), InteractionMode::AnnotateArmed);
        assert_eq!(
            viewer.on_left_click(ScreenPosition::new(40, 60)),
            ClickOutcome::Annotated(0)
        );
        assert_eq!(viewer.mode(), InteractionMode::Normal);
        assert!(viewer.pending_annotation().is_none());
        assert_eq!(
            viewer.on_left_click(ScreenPosition::new(41, 61)),
            ClickOutcome::CameraInteraction
        );

        let annotation = viewer.annotations().get(0).unwrap();
        assert_eq!(annotation.text(), "vessel");
        assert_eq!(annotation.position(), ScreenPosition::new(40, 60));
        assert_eq!(viewer.annotations().len(), 1);
    }

    #[test]
    fn test_planarity_threshold_slider() {
        let mut viewer = viewer();
        viewer.set_planarity_threshold(3.0).unwrap();
        assert!(!viewer.is_planar());
        assert!(viewer.set_planarity_threshold(0.0).is_err());
        assert_eq!(viewer.planarity_threshold(), 3.0);
    }
}
