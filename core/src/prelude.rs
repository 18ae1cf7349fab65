use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Lower edge of the HI search window in Hz.
pub const FMIN_HZ: f64 = 1405e6;
/// Upper edge of the HI search window in Hz.
pub const FMAX_HZ: f64 = 1420e6;
/// Rest frequency of the neutral-hydrogen 21 cm line.
pub const HI_REST_FREQUENCY_HZ: f64 = 1420.40575177e6;
/// Speed of light in m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
/// Row spacing of the reference tables shipped with the survey.
pub const DEFAULT_TABLE_SPACING_DEG: u32 = 5;

/// Inclusive frequency window used for peak search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyWindow {
    pub min_hz: f64,
    pub max_hz: f64,
}

impl FrequencyWindow {
    pub fn contains(&self, frequency_hz: f64) -> bool {
        frequency_hz >= self.min_hz && frequency_hz <= self.max_hz
    }
}

impl Default for FrequencyWindow {
    fn default() -> Self {
        Self {
            min_hz: FMIN_HZ,
            max_hz: FMAX_HZ,
        }
    }
}

/// Unit the geometric angle column of the reference table is stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Radians,
    Degrees,
}

impl AngleUnit {
    pub fn to_radians(self, value: f64) -> f64 {
        match self {
            AngleUnit::Radians => value,
            AngleUnit::Degrees => value.to_radians(),
        }
    }
}

/// Shared configuration for each processing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub max_angle: u32,
    pub angle_step: u32,
    pub window: FrequencyWindow,
    pub rest_frequency_fallback_hz: f64,
    pub table_dir: PathBuf,
    pub table_spacing_deg: u32,
    pub angle_unit: AngleUnit,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            max_angle: 60,
            angle_step: 5,
            window: FrequencyWindow::default(),
            rest_frequency_fallback_hz: HI_REST_FREQUENCY_HZ,
            table_dir: PathBuf::from("tables"),
            table_spacing_deg: DEFAULT_TABLE_SPACING_DEG,
            angle_unit: AngleUnit::Radians,
        }
    }
}

impl StageConfig {
    /// Checks the longitude grid and window before any stage touches the disk.
    pub fn validate(&self) -> StageResult<()> {
        if self.angle_step == 0 {
            return Err(StageError::Config("angle step must be > 0".into()));
        }
        if self.max_angle % self.angle_step != 0 {
            return Err(StageError::Config(format!(
                "angle step {} does not divide max angle {}",
                self.angle_step, self.max_angle
            )));
        }
        if self.window.min_hz.is_nan()
            || self.window.max_hz.is_nan()
            || self.window.min_hz >= self.window.max_hz
        {
            return Err(StageError::Config(format!(
                "frequency window [{}, {}] is empty",
                self.window.min_hz, self.window.max_hz
            )));
        }
        if self.rest_frequency_fallback_hz.is_nan() || self.rest_frequency_fallback_hz <= 0.0 {
            return Err(StageError::Config(
                "rest frequency fallback must be positive".into(),
            ));
        }
        if self.table_spacing_deg == 0 {
            return Err(StageError::Config("table spacing must be > 0".into()));
        }
        Ok(())
    }

    /// Longitudes `0, step, 2*step, ..., max_angle`.
    pub fn longitudes(&self) -> Vec<u32> {
        if self.angle_step == 0 {
            return Vec::new();
        }
        (0..=self.max_angle)
            .step_by(self.angle_step as usize)
            .collect()
    }
}

/// Common error type for stage execution.
#[derive(thiserror::Error, Debug)]
pub enum StageError {
    #[error("missing input: {0}")]
    MissingInput(String),
    #[error("no .{extension} files found under {dir}")]
    NoInputFiles { dir: PathBuf, extension: String },
    #[error("no peak detected for any longitude")]
    NoPeakDetected,
    #[error("reference tables not found in {dir}: {missing}")]
    ReferenceTableMissing { dir: PathBuf, missing: PathBuf },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("internal failure: {0}")]
    Internal(String),
}

impl StageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StageError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StageError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Message suitable for an interactive user who has to fix the input.
    pub fn user_message(&self) -> String {
        match self {
            StageError::MissingInput(what) => format!("Input not found: {what}"),
            StageError::NoInputFiles { dir, extension } => {
                format!("No .{extension} files were found in {}", dir.display())
            }
            StageError::NoPeakDetected => "No peak could be detected".to_string(),
            StageError::ReferenceTableMissing { dir, .. } => format!(
                "Reference table files were not found; check the tables folder {}",
                dir.display()
            ),
            other => other.to_string(),
        }
    }
}

pub type StageResult<T> = Result<T, StageError>;

/// Trait describing the pipeline's processing stages.
pub trait ProcessingStage {
    type Input;
    type Output;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()>;
    fn execute(&mut self, input: Self::Input) -> StageResult<Self::Output>;
    fn cleanup(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        StageConfig::default().validate().unwrap();
    }

    #[test]
    fn longitudes_include_max_angle() {
        let config = StageConfig {
            max_angle: 20,
            angle_step: 5,
            ..Default::default()
        };
        assert_eq!(config.longitudes(), vec![0, 5, 10, 15, 20]);
    }

    #[test]
    fn step_must_divide_range() {
        let config = StageConfig {
            max_angle: 20,
            angle_step: 7,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(StageError::Config(_))));

        let zero = StageConfig {
            angle_step: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
        assert!(zero.longitudes().is_empty());
    }

    #[test]
    fn nan_window_and_fallback_are_rejected() {
        let window = StageConfig {
            window: FrequencyWindow {
                min_hz: f64::NAN,
                max_hz: FMAX_HZ,
            },
            ..Default::default()
        };
        assert!(matches!(window.validate(), Err(StageError::Config(_))));

        let inverted = StageConfig {
            window: FrequencyWindow {
                min_hz: FMAX_HZ,
                max_hz: FMIN_HZ,
            },
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let fallback = StageConfig {
            rest_frequency_fallback_hz: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(fallback.validate(), Err(StageError::Config(_))));
    }

    #[test]
    fn window_is_inclusive() {
        let window = FrequencyWindow::default();
        assert!(window.contains(FMIN_HZ));
        assert!(window.contains(FMAX_HZ));
        assert!(!window.contains(HI_REST_FREQUENCY_HZ));
    }

    #[test]
    fn missing_tables_message_mentions_folder() {
        let err = StageError::ReferenceTableMissing {
            dir: PathBuf::from("tables"),
            missing: PathBuf::from("tables/E_s表.csv"),
        };
        assert!(err.user_message().contains("tables"));
    }
}
