//! # DICOM-reslice library
//!
//! Filtered DICOM volumes with interactive clipping and oblique reslicing.
//!
//! A loaded series becomes a [`VoxelGrid`] that runs through a lazy filter
//! chain (median denoise, anisotropic diffusion, 3x3 sharpen). Each stage
//! can be re-parameterised at runtime and only stale stages are recomputed.
//! A manipulable [`ClipBox`] clips the rendered volume through six
//! half-spaces; once the box is thin enough along one of its own axes, its
//! transform defines a [`CuttingPlane`] and the filtered volume is resampled
//! on that plane with trilinear interpolation.
//!
//! Rendering, windowing and camera handling belong to the host toolkit. The
//! [`Viewer`] session exposes plain synchronous calls for it to drive:
//!  - `on_interaction_update` when the box widget moves
//!  - `on_parameter_change` (or the per-field helpers) for filter controls
//!  - `display_slice` / `toggle_slice_view` for the slice view
//!  - `arm_annotation` and `on_left_click` for text annotations
//!
//! # Examples
//!
//! ## Slicing through the middle of a series
//!
//! ```no_run
//! # use dicom_reslice::{SortBy, Viewer, ViewerConfig, VolumeLoader};
//! # use nalgebra::{UnitQuaternion, Vector3};
//! # use dicom_reslice::ClipBox;
//! let grid = VolumeLoader::load_from_directory("dicom", SortBy::InstanceNumber)
//!     .expect("should have loaded files from directory");
//! let center = grid.center();
//! let mut viewer = Viewer::new(grid, ViewerConfig::default())
//!     .expect("default configuration is valid");
//!
//! let thin = ClipBox::from_parts(center, UnitQuaternion::identity(), Vector3::new(200.0, 200.0, 2.0));
//! viewer
//!     .on_interaction_update(*thin.transform())
//!     .expect("box is not degenerate");
//! let slice = viewer.display_slice().expect("box is planar");
//! slice
//!     .to_image()
//!     .expect("raster matches its size")
//!     .save("slice.png")
//!     .expect("should have written the image");
//! ```

pub mod annotation;
pub mod clip_box;
pub mod config;
pub mod enums;
pub mod error;
pub mod filter;
pub mod geometry;
mod interpolator;
pub mod pipeline;
pub mod reslice;
pub mod transfer_function;
pub mod viewer;
pub mod volume;
pub mod volume_loader;

pub use annotation::{Annotation, AnnotationStore, ScreenPosition};
pub use clip_box::{ClipBox, HalfSpace};
pub use config::ViewerConfig;
pub use enums::{Connectivity, InteractionMode, Interpolation, Orientation, SortBy, StageId};
pub use error::{Result, ViewerError};
pub use filter::{CancelToken, DiffusionParams, FilterParams, MedianParams, SharpenParams};
pub use geometry::{CuttingPlane, InPlaneBasis};
pub use pipeline::{FilterPipeline, StageState};
pub use reslice::{ReslicedImage, Reslicer};
pub use transfer_function::TransferFunction;
pub use viewer::{ClickOutcome, Viewer};
pub use volume::VoxelGrid;
pub use volume_loader::{VolumeLoader, VolumeLoaderError};
