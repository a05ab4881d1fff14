#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

/// Sampler used when a slice is resampled from the volume.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    Nearest,
    #[default]
    Trilinear,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// The three stages of the filter chain, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StageId {
    Denoise,
    Diffuse,
    Sharpen,
}

impl StageId {
    pub const ALL: [StageId; 3] = [StageId::Denoise, StageId::Diffuse, StageId::Sharpen];

    pub(crate) fn index(self) -> usize {
        match self {
            StageId::Denoise => 0,
            StageId::Diffuse => 1,
            StageId::Sharpen => 2,
        }
    }

    /// The stage feeding this one, `None` for the first stage (raw data).
    pub fn upstream(self) -> Option<StageId> {
        match self {
            StageId::Denoise => None,
            StageId::Diffuse => Some(StageId::Denoise),
            StageId::Sharpen => Some(StageId::Diffuse),
        }
    }
}

/// Which neighbours take part in one diffusion step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 6 face neighbours
    Faces,
    /// 18 face and edge neighbours
    FacesEdges,
    /// all 26 neighbours
    #[default]
    Full,
}

/// How a left click is dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InteractionMode {
    #[default]
    Normal,
    AnnotateArmed,
}
