use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use galrotcore::io::{export_velocity_csv, export_velocity_json};
use galrotcore::pipeline::{average_observations, calculate_velocity, convert_legacy};
use galrotcore::prelude::{StageError, StageResult};
use galrotcore::processing::convert::find_legacy_files;
use galrotcore::processing::{AverageSummary, ConversionSummary, VelocityReport};
use log::info;
use std::path::{Path, PathBuf};

/// Everything a full `run` produced.
pub struct WorkflowResult {
    pub conversion: Option<ConversionSummary>,
    pub averaging: AverageSummary,
    pub velocity: VelocityReport,
    pub exported: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn convert(&self, dir: &Path) -> anyhow::Result<ConversionSummary> {
        let stage_config = self.config.to_stage_config();
        user_facing(convert_legacy(&stage_config, dir))
            .with_context(|| format!("converting legacy files in {}", dir.display()))
    }

    pub fn average(&self) -> anyhow::Result<AverageSummary> {
        let stage_config = self.config.to_stage_config();
        let target = self.config.target_dir();
        user_facing(average_observations(
            &stage_config,
            self.config.average_request(),
        ))
        .with_context(|| format!("averaging observations in {}", target.display()))
    }

    pub fn velocity(&self) -> anyhow::Result<VelocityReport> {
        let stage_config = self.config.to_stage_config();
        let target = self.config.target_dir();
        user_facing(calculate_velocity(
            &stage_config,
            &target,
            self.config.peak_mode(),
        ))
        .with_context(|| format!("calculating rotation speeds for {}", target.display()))
    }

    /// Writes `report` to the configured export path, if any.
    pub fn export(&self, report: &VelocityReport) -> anyhow::Result<Option<PathBuf>> {
        let Some(path) = self.config.export.clone() else {
            return Ok(None);
        };
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let written = if is_json {
            export_velocity_json(&report.rows, &path)
        } else {
            export_velocity_csv(&report.rows, &path)
        };
        user_facing(written).with_context(|| format!("exporting results to {}", path.display()))?;
        info!("exported {} rows to {}", report.rows.len(), path.display());
        Ok(Some(path))
    }

    /// Converts legacy files when the target holds any, then averages and
    /// calculates the rotation curve.
    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let target = self.config.target_dir();
        let legacy = user_facing(find_legacy_files(&target))
            .with_context(|| format!("scanning {} for legacy files", target.display()))?;
        let conversion = if legacy.is_empty() {
            None
        } else {
            Some(self.convert(&target)?)
        };

        let averaging = self.average()?;
        let velocity = self.velocity()?;
        let exported = self.export(&velocity)?;

        Ok(WorkflowResult {
            conversion,
            averaging,
            velocity,
            exported,
        })
    }
}

/// Lifts a stage error into the driver's error chain with its user-facing text on top.
fn user_facing<T>(result: StageResult<T>) -> anyhow::Result<T> {
    result.map_err(|err: StageError| {
        let message = err.user_message();
        anyhow::Error::new(err).context(message)
    })
}
