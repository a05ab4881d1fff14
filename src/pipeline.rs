use crate::enums::StageId;
use crate::error::{Result, ViewerError};
use crate::filter::{CancelToken, DiffusionParams, FilterParams, MedianParams, SharpenParams};
use crate::volume::VoxelGrid;

use log::{debug, info, warn};
use web_time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageState {
    Clean,
    Dirty,
    Computing,
}

#[derive(Debug)]
struct FilterStage {
    params: FilterParams,
    state: StageState,
    /// `None` until the stage commits its first result.
    output: Option<VoxelGrid>,
    /// Pipeline clock value when `output` was last committed.
    version: u64,
    /// Upstream version `output` was computed from.
    input_version: u64,
}

impl FilterStage {
    fn new(params: FilterParams) -> Self {
        Self {
            params,
            state: StageState::Dirty,
            output: None,
            version: 0,
            input_version: 0,
        }
    }
}

/// The denoise -> diffuse -> sharpen chain over a loaded volume.
///
/// Stages are evaluated lazily. Changing a stage's parameters only marks it
/// dirty; the next [`FilterPipeline::evaluate`] of that stage or anything
/// downstream recomputes what is stale and reuses every clean upstream
/// output. A stage is stale when it is dirty or its upstream committed a
/// newer output than the one it was computed from.
#[derive(Debug)]
pub struct FilterPipeline {
    source: VoxelGrid,
    source_version: u64,
    stages: [FilterStage; 3],
    clock: u64,
}

impl FilterPipeline {
    pub fn new(
        source: VoxelGrid,
        denoise: MedianParams,
        diffuse: DiffusionParams,
        sharpen: SharpenParams,
    ) -> Self {
        let stages = [
            FilterStage::new(FilterParams::Denoise(denoise)),
            FilterStage::new(FilterParams::Diffuse(diffuse)),
            FilterStage::new(FilterParams::Sharpen(sharpen)),
        ];
        Self {
            source,
            source_version: 1,
            stages,
            clock: 1,
        }
    }

    /// The raw volume the chain starts from.
    pub fn source(&self) -> &VoxelGrid {
        &self.source
    }

    pub fn params(&self, stage: StageId) -> FilterParams {
        self.stages[stage.index()].params
    }

    pub fn state(&self, stage: StageId) -> StageState {
        self.stages[stage.index()].state
    }

    /// Version of the last committed output of `stage`; grows with every
    /// recomputation anywhere in the pipeline.
    pub fn version(&self, stage: StageId) -> u64 {
        self.stages[stage.index()].version
    }

    /// Version of the chain's final output.
    pub fn output_version(&self) -> u64 {
        self.version(StageId::Sharpen)
    }

    /// Replace the parameters of `stage` and mark it dirty.
    ///
    /// The parameter kind must match the stage; otherwise nothing changes.
    pub fn set_parameters(&mut self, stage: StageId, params: FilterParams) -> Result<()> {
        let matches = matches!(
            (stage, &params),
            (StageId::Denoise, FilterParams::Denoise(_))
                | (StageId::Diffuse, FilterParams::Diffuse(_))
                | (StageId::Sharpen, FilterParams::Sharpen(_))
        );
        if !matches {
            warn!("Rejected {params:?} for stage {stage:?}");
            return Err(ViewerError::InvalidParameter(format!(
                "parameters do not belong to the {stage:?} stage"
            )));
        }
        let slot = &mut self.stages[stage.index()];
        slot.params = params;
        slot.state = StageState::Dirty;
        debug!("Stage {stage:?} marked dirty");
        Ok(())
    }

    pub fn evaluate(&mut self, stage: StageId) -> Result<&VoxelGrid> {
        self.evaluate_with(stage, &CancelToken::new())
    }

    /// Bring `stage` up to date and return its output.
    ///
    /// A cancelled or failed run leaves every committed output untouched;
    /// the interrupted stage stays dirty.
    pub fn evaluate_with(&mut self, stage: StageId, cancel: &CancelToken) -> Result<&VoxelGrid> {
        self.evaluate_versioned(stage, cancel).map(|(output, _)| output)
    }

    /// Like [`FilterPipeline::evaluate_with`], also returning the version of
    /// the output.
    pub fn evaluate_versioned(
        &mut self,
        stage: StageId,
        cancel: &CancelToken,
    ) -> Result<(&VoxelGrid, u64)> {
        self.ensure(stage, cancel)?;
        let slot = &self.stages[stage.index()];
        let output = slot.output.as_ref().ok_or_else(|| missing_output(stage))?;
        Ok((output, slot.version))
    }

    /// The final output of the chain.
    pub fn output(&mut self) -> Result<&VoxelGrid> {
        self.evaluate(StageId::Sharpen)
    }

    /// Whatever `stage` last committed, without evaluating.
    pub fn cached_output(&self, stage: StageId) -> Option<&VoxelGrid> {
        self.stages[stage.index()].output.as_ref()
    }

    pub fn is_stale(&self, stage: StageId) -> bool {
        let slot = &self.stages[stage.index()];
        slot.state != StageState::Clean
            || slot.input_version != self.upstream_version(stage)
            || stage.upstream().is_some_and(|up| self.is_stale(up))
    }

    fn upstream_version(&self, stage: StageId) -> u64 {
        match stage.upstream() {
            Some(up) => self.stages[up.index()].version,
            None => self.source_version,
        }
    }

    fn input_of(&self, stage: StageId) -> Result<&VoxelGrid> {
        match stage.upstream() {
            Some(up) => self.cached_output(up).ok_or_else(|| missing_output(up)),
            None => Ok(&self.source),
        }
    }

    fn ensure(&mut self, stage: StageId, cancel: &CancelToken) -> Result<()> {
        if let Some(up) = stage.upstream() {
            self.ensure(up, cancel)?;
        }
        let upstream_version = self.upstream_version(stage);
        let index = stage.index();
        {
            let slot = &self.stages[index];
            if slot.state == StageState::Clean
                && slot.input_version == upstream_version
                && slot.output.is_some()
            {
                debug!("Stage {stage:?} is clean (version {})", slot.version);
                return Ok(());
            }
        }

        self.stages[index].state = StageState::Computing;
        let started = Instant::now();
        let params = self.stages[index].params;
        let input = match self.input_of(stage) {
            Ok(input) => input,
            Err(err) => {
                self.stages[index].state = StageState::Dirty;
                return Err(err);
            }
        };
        let (spacing, origin) = (input.spacing(), input.origin());
        let result = params
            .apply(&input.data(), cancel)
            .and_then(|data| VoxelGrid::new(data, spacing, origin));

        let slot = &mut self.stages[index];
        match result {
            Ok(output) => {
                slot.output = Some(output);
                self.clock += 1;
                slot.version = self.clock;
                slot.input_version = upstream_version;
                slot.state = StageState::Clean;
                info!(
                    "Evaluated {stage:?} in {:.1?} (version {})",
                    started.elapsed(),
                    slot.version
                );
                Ok(())
            }
            Err(err) => {
                slot.state = StageState::Dirty;
                warn!("Evaluation of {stage:?} failed: {err}");
                Err(err)
            }
        }
    }
}

fn missing_output(stage: StageId) -> ViewerError {
    ViewerError::InvalidParameter(format!("stage {stage:?} has no committed output"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};
    use ndarray::Array3;

    fn grid() -> VoxelGrid {
        let data = Array3::from_shape_fn((5, 6, 7), |(z, y, x)| {
            ((z * 13 + y * 7 + x * 3) % 11) as f32 * 4.0
        });
        VoxelGrid::new(data, Vector3::repeat(1.0), Point3::origin()).unwrap()
    }

    fn identity_pipeline() -> FilterPipeline {
        FilterPipeline::new(
            grid(),
            MedianParams::uniform(1).unwrap(),
            DiffusionParams::new(0, 1.0, 0.1).unwrap(),
            SharpenParams::new(SharpenParams::IDENTITY).unwrap(),
        )
    }

    #[test]
    fn test_stages_start_dirty() {
        let pipeline = identity_pipeline();
        for stage in StageId::ALL {
            assert_eq!(pipeline.state(stage), StageState::Dirty);
            assert!(pipeline.is_stale(stage));
            assert!(pipeline.cached_output(stage).is_none());
        }
    }

    #[test]
    fn test_outputs_appear_only_for_evaluated_stages() {
        let mut pipeline = identity_pipeline();
        let (output, version) = pipeline
            .evaluate_versioned(StageId::Diffuse, &CancelToken::new())
            .unwrap();
        assert_eq!(output.dim(), (5, 6, 7));
        assert_eq!(version, pipeline.version(StageId::Diffuse));
        assert!(pipeline.cached_output(StageId::Denoise).is_some());
        assert!(pipeline.cached_output(StageId::Diffuse).is_some());
        assert!(pipeline.cached_output(StageId::Sharpen).is_none());
    }

    #[test]
    fn test_identity_chain_reproduces_source() {
        let mut pipeline = identity_pipeline();
        let source = pipeline.source().clone();
        let output = pipeline.output().unwrap().clone();
        assert_eq!(output, source);
        for stage in StageId::ALL {
            assert_eq!(pipeline.state(stage), StageState::Clean);
        }
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let mut pipeline = FilterPipeline::new(
            grid(),
            MedianParams::default(),
            DiffusionParams::new(2, 1.0, 10.0).unwrap(),
            SharpenParams::default(),
        );
        let first = pipeline.output().unwrap().clone();
        let version = pipeline.output_version();
        let second = pipeline.output().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(version, pipeline.output_version());
    }

    #[test]
    fn test_parameter_change_reruns_only_affected_stages() {
        let mut pipeline = identity_pipeline();
        pipeline.output().unwrap();
        let denoise_version = pipeline.version(StageId::Denoise);
        let diffuse_version = pipeline.version(StageId::Diffuse);
        let sharpen_version = pipeline.version(StageId::Sharpen);

        pipeline
            .set_parameters(
                StageId::Sharpen,
                FilterParams::Sharpen(SharpenParams::from_strength(1.0).unwrap()),
            )
            .unwrap();
        assert_eq!(pipeline.state(StageId::Sharpen), StageState::Dirty);
        assert_eq!(pipeline.state(StageId::Diffuse), StageState::Clean);

        pipeline.output().unwrap();
        assert_eq!(pipeline.version(StageId::Denoise), denoise_version);
        assert_eq!(pipeline.version(StageId::Diffuse), diffuse_version);
        assert!(pipeline.version(StageId::Sharpen) > sharpen_version);
    }

    #[test]
    fn test_upstream_change_propagates_downstream() {
        let mut pipeline = identity_pipeline();
        pipeline.output().unwrap();
        let sharpen_version = pipeline.output_version();

        pipeline
            .set_parameters(
                StageId::Denoise,
                FilterParams::Denoise(MedianParams::uniform(3).unwrap()),
            )
            .unwrap();
        assert_eq!(pipeline.state(StageId::Sharpen), StageState::Clean);
        assert!(pipeline.is_stale(StageId::Sharpen));

        let expected = pipeline.evaluate(StageId::Denoise).unwrap().clone();
        let output = pipeline.output().unwrap().clone();
        assert!(pipeline.output_version() > sharpen_version);
        assert_eq!(output, expected);
    }

    #[test]
    fn test_mismatched_parameters_are_rejected() {
        let mut pipeline = identity_pipeline();
        pipeline.output().unwrap();
        let result = pipeline.set_parameters(
            StageId::Denoise,
            FilterParams::Sharpen(SharpenParams::default()),
        );
        assert!(matches!(result, Err(ViewerError::InvalidParameter(_))));
        assert_eq!(pipeline.state(StageId::Denoise), StageState::Clean);
        assert_eq!(
            pipeline.params(StageId::Denoise),
            FilterParams::Denoise(MedianParams::uniform(1).unwrap())
        );
    }

    #[test]
    fn test_cancelled_evaluation_keeps_previous_output() {
        let mut pipeline = identity_pipeline();
        let before = pipeline.output().unwrap().clone();
        let version = pipeline.output_version();

        pipeline
            .set_parameters(
                StageId::Diffuse,
                FilterParams::Diffuse(DiffusionParams::new(5, 1.0, 100.0).unwrap()),
            )
            .unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = pipeline.evaluate_with(StageId::Sharpen, &cancel);
        assert_eq!(result.err(), Some(ViewerError::Cancelled));
        assert_eq!(pipeline.state(StageId::Diffuse), StageState::Dirty);
        assert_eq!(pipeline.cached_output(StageId::Sharpen), Some(&before));
        assert_eq!(pipeline.output_version(), version);

        pipeline.output().unwrap();
        assert!(pipeline.output_version() > version);
    }
}
