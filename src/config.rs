use crate::annotation::{ANNOTATION_RED, Rgb};
use crate::enums::{Interpolation, SortBy};
use crate::error::{Result, ViewerError};
use crate::filter::{DiffusionParams, MedianParams, SharpenParams};
use crate::transfer_function::TransferFunction;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Range of the bounding-box width slider.
pub const PLANARITY_THRESHOLD_RANGE: std::ops::RangeInclusive<f64> = 1.0..=100.0;

/// Start-up values of a viewing session.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewerConfig {
    pub denoise: MedianParams,
    pub diffuse: DiffusionParams,
    pub sharpen: SharpenParams,
    /// A box thinner than this along any of its own axes counts as a plane.
    pub planarity_threshold: f64,
    pub slice_window: f32,
    pub slice_level: f32,
    pub interpolation: Interpolation,
    pub annotation_color: Rgb,
    pub transfer_function: TransferFunction,
    pub sort_by: SortBy,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            denoise: MedianParams::default(),
            diffuse: DiffusionParams::default(),
            sharpen: SharpenParams::default(),
            planarity_threshold: 10.0,
            slice_window: 255.0,
            slice_level: 127.5,
            interpolation: Interpolation::default(),
            annotation_color: ANNOTATION_RED,
            transfer_function: TransferFunction::default(),
            sort_by: SortBy::default(),
        }
    }
}

impl ViewerConfig {
    pub fn validate(&self) -> Result<()> {
        check_planarity_threshold(self.planarity_threshold)?;
        if !self.slice_window.is_finite() || self.slice_window <= 0.0 || !self.slice_level.is_finite()
        {
            return Err(ViewerError::InvalidParameter(format!(
                "window {} / level {} out of range",
                self.slice_window, self.slice_level
            )));
        }
        Ok(())
    }
}

pub(crate) fn check_planarity_threshold(value: f64) -> Result<f64> {
    if PLANARITY_THRESHOLD_RANGE.contains(&value) {
        Ok(value)
    } else {
        Err(ViewerError::InvalidParameter(format!(
            "planarity threshold {value} outside {PLANARITY_THRESHOLD_RANGE:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_startup_values() {
        let config = ViewerConfig::default();
        assert_eq!(config.denoise.kernel_size(), [3, 3, 3]);
        assert_eq!(config.diffuse.iterations(), 1);
        assert_eq!(config.diffuse.diffusion_factor(), 1.0);
        assert_eq!(config.diffuse.threshold(), 0.1);
        assert_eq!(config.sharpen, SharpenParams::from_strength(1.0).unwrap());
        assert_eq!(config.planarity_threshold, 10.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_outside_slider_range_is_invalid() {
        let config = ViewerConfig {
            planarity_threshold: 0.5,
            ..ViewerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ViewerError::InvalidParameter(_))
        ));
        assert!(check_planarity_threshold(100.0).is_ok());
        assert!(check_planarity_threshold(101.0).is_err());
    }
}
