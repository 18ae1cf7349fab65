//! One-call entry points composing the stages in survey order:
//! convert, average, peaks, velocities.

use std::path::{Path, PathBuf};

use crate::prelude::{ProcessingStage, StageConfig, StageResult};
use crate::processing::average::AVG_DIR_NAME;
use crate::processing::{
    AverageRequest, AverageStage, AverageSummary, ConversionSummary, ConvertStage, PeakMode,
    PeakSet, PeakStage, VelocityReport, VelocityStage,
};

/// Runs `stage` through its full lifecycle; cleanup happens on failure too.
pub fn run_stage<S: ProcessingStage>(
    stage: &mut S,
    config: &StageConfig,
    input: S::Input,
) -> StageResult<S::Output> {
    let result = stage
        .initialize(config)
        .and_then(|()| stage.execute(input));
    stage.cleanup();
    result
}

pub fn convert_legacy(config: &StageConfig, dir: &Path) -> StageResult<ConversionSummary> {
    run_stage(&mut ConvertStage::new(), config, dir.to_path_buf())
}

pub fn average_observations(
    config: &StageConfig,
    request: AverageRequest,
) -> StageResult<AverageSummary> {
    run_stage(&mut AverageStage::new(), config, request)
}

/// Directory holding the averaged spectra of an observation set.
pub fn averaged_dir(target: &Path) -> PathBuf {
    target.join(AVG_DIR_NAME)
}

pub fn extract_peaks(config: &StageConfig, target: &Path, mode: PeakMode) -> StageResult<PeakSet> {
    run_stage(&mut PeakStage::new(mode), config, averaged_dir(target))
}

/// Peaks of `target`'s averaged spectra turned into a rotation curve.
pub fn calculate_velocity(
    config: &StageConfig,
    target: &Path,
    mode: PeakMode,
) -> StageResult<VelocityReport> {
    let peaks = extract_peaks(config, target, mode)?;
    run_stage(&mut VelocityStage::new(), config, peaks)
}
