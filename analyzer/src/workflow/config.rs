use anyhow::Context;
use galrotcore::prelude::{
    AngleUnit, FrequencyWindow, StageConfig, DEFAULT_TABLE_SPACING_DEG, FMAX_HZ, FMIN_HZ,
    HI_REST_FREQUENCY_HZ,
};
use galrotcore::processing::{AverageRequest, PeakMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub data_root: PathBuf,
    /// Observation set, relative to `data_root` unless absolute.
    pub target: PathBuf,
    pub tables_dir: PathBuf,
    pub max_angle: u32,
    pub angle_step: u32,
    pub background_subtraction: bool,
    /// `.json` exports JSON, anything else a Shift-JIS CSV.
    pub export: Option<PathBuf>,
    pub window_min_hz: f64,
    pub window_max_hz: f64,
    pub rest_frequency_fallback_hz: f64,
    pub angle_unit: AngleUnit,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            target: PathBuf::from("."),
            tables_dir: PathBuf::from("tables"),
            max_angle: 60,
            angle_step: 5,
            background_subtraction: true,
            export: None,
            window_min_hz: FMIN_HZ,
            window_max_hz: FMAX_HZ,
            rest_frequency_fallback_hz: HI_REST_FREQUENCY_HZ,
            angle_unit: AngleUnit::Radians,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_stage_config(&self) -> StageConfig {
        StageConfig {
            max_angle: self.max_angle,
            angle_step: self.angle_step,
            window: FrequencyWindow {
                min_hz: self.window_min_hz,
                max_hz: self.window_max_hz,
            },
            rest_frequency_fallback_hz: self.rest_frequency_fallback_hz,
            table_dir: self.tables_dir.clone(),
            table_spacing_deg: DEFAULT_TABLE_SPACING_DEG,
            angle_unit: self.angle_unit,
        }
    }

    pub fn average_request(&self) -> AverageRequest {
        AverageRequest::new(self.data_root.clone(), self.target.clone())
    }

    pub fn target_dir(&self) -> PathBuf {
        self.average_request().target_dir()
    }

    pub fn peak_mode(&self) -> PeakMode {
        if self.background_subtraction {
            PeakMode::BackgroundSubtraction
        } else {
            PeakMode::MedianBaseline
        }
    }
}
