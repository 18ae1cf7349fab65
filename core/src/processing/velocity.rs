use crate::io::{LoadOutcome, ReferenceTable, TableRow};
use crate::prelude::{ProcessingStage, StageConfig, StageError, StageResult, SPEED_OF_LIGHT};
use crate::records::{PeakRecord, RestFrequency, VelocityRow};
use crate::telemetry::{LogManager, MetricsRecorder};

use super::peak::PeakSet;

/// `|sin θ|` below this makes the line of sight degenerate.
pub const DEGENERATE_SIN: f64 = 1e-6;

/// Rotation curve for one observation set.
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityReport {
    /// Sorted ascending by longitude.
    pub rows: Vec<VelocityRow>,
    pub rest_frequency: RestFrequency,
    pub logs: Vec<String>,
}

/// Turns peak frequencies into rotation speeds through the reference table.
pub struct VelocityStage {
    config: Option<StageConfig>,
    table: Option<ReferenceTable>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl VelocityStage {
    pub fn new() -> Self {
        Self {
            config: None,
            table: None,
            logger: LogManager::new("galrotcore::velocity"),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Uses `table` instead of reading it from the configured directory.
    pub fn with_table(table: ReferenceTable) -> Self {
        Self {
            table: Some(table),
            ..Self::new()
        }
    }

    fn table(&mut self, config: &StageConfig) -> StageResult<ReferenceTable> {
        if let Some(table) = &self.table {
            return Ok(table.clone());
        }
        match ReferenceTable::load(&config.table_dir, config.table_spacing_deg)? {
            LoadOutcome::Found(table) => {
                self.logger.record(&format!(
                    "loaded reference table with {} rows from {}",
                    table.len(),
                    config.table_dir.display()
                ));
                Ok(table)
            }
            LoadOutcome::NotFound(missing) => Err(StageError::ReferenceTableMissing {
                dir: config.table_dir.clone(),
                missing,
            }),
        }
    }
}

impl Default for VelocityStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for VelocityStage {
    type Input = PeakSet;
    type Output = VelocityReport;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.logger.clear();
        self.metrics.reset();
        Ok(())
    }

    fn execute(&mut self, peaks: PeakSet) -> StageResult<VelocityReport> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let table = self.table(&config)?;
        table.check_step(config.angle_step)?;

        let mut rows = Vec::with_capacity(peaks.records.len());
        for peak in &peaks.records {
            let Some(row) = table
                .index_for(peak.longitude_deg)
                .and_then(|index| table.row(index))
            else {
                self.metrics.record_skipped();
                continue;
            };
            let theta = config.angle_unit.to_radians(row.theta);
            rows.push(VelocityRow {
                longitude_deg: peak.longitude_deg,
                distance_ly: row.distance_ly,
                speed_kms: rotation_speed_kms(peak, &row, theta, peaks.rest_frequency.hz),
            });
            self.metrics.record_processed();
        }
        rows.sort_by_key(|row| row.longitude_deg);
        self.metrics.report("velocity");

        let mut logs = peaks.logs;
        logs.extend(self.logger.take());
        Ok(VelocityReport {
            rows,
            rest_frequency: peaks.rest_frequency,
            logs,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
        self.logger.clear();
    }
}

/// `|c - (c - |E_s|) * f_rest / f_peak| / |sin θ|` in km/s, or `None` when
/// `sin θ` is within [`DEGENERATE_SIN`] of zero.
pub fn rotation_speed_kms(
    peak: &PeakRecord,
    row: &TableRow,
    theta_rad: f64,
    rest_frequency_hz: f64,
) -> Option<f64> {
    let sin_theta = theta_rad.sin();
    if sin_theta.abs() < DEGENERATE_SIN {
        return None;
    }
    let ratio = rest_frequency_hz / peak.peak_frequency_hz;
    let line_of_sight = SPEED_OF_LIGHT - (SPEED_OF_LIGHT - row.correction.abs()) * ratio;
    Some((line_of_sight / sin_theta).abs() / 1000.0)
}
