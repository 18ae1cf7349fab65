use glob::Pattern;
use std::path::{Path, PathBuf};

use crate::io::{glob_error, read_spectrum, write_spectrum, Spectrum};
use crate::math::{MatrixHelper, StatsHelper};
use crate::prelude::{ProcessingStage, StageConfig, StageError, StageResult};
use crate::records::{Band, ObservationKey};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Name of the directory, under the observation set, holding averaged spectra.
pub const AVG_DIR_NAME: &str = "avg";

/// Which observation set to average.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageRequest {
    pub data_root: PathBuf,
    /// Observation set; relative paths are resolved against `data_root`.
    pub target: PathBuf,
}

impl AverageRequest {
    pub fn new(data_root: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            target: target.into(),
        }
    }

    pub fn target_dir(&self) -> PathBuf {
        if self.target.is_absolute() {
            self.target.clone()
        } else {
            self.data_root.join(&self.target)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AverageSummary {
    /// Observation keys for which an averaged file was written.
    pub processed: usize,
    pub avg_dir: PathBuf,
    pub errors: Vec<String>,
}

/// Averages every raw scan group `<lon><suffix>.*.csv` into `avg/<lon><suffix>_avg.csv`.
pub struct AverageStage {
    config: Option<StageConfig>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl AverageStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("galrotcore::average"),
            metrics: MetricsRecorder::new(),
        }
    }
}

impl Default for AverageStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for AverageStage {
    type Input = AverageRequest;
    type Output = AverageSummary;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.logger.clear();
        self.metrics.reset();
        Ok(())
    }

    fn execute(&mut self, request: AverageRequest) -> StageResult<AverageSummary> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        let target = request.target_dir();
        if !target.is_dir() {
            return Err(StageError::MissingInput(format!(
                "data folder {} does not exist",
                target.display()
            )));
        }

        let avg_dir = target.join(AVG_DIR_NAME);
        std::fs::create_dir_all(&avg_dir).map_err(|err| StageError::io(&avg_dir, err))?;
        let removed = purge_averaged(&avg_dir)?;
        if removed > 0 {
            self.logger
                .record(&format!("removed {removed} stale averaged files"));
        }

        let mut processed = 0;
        let mut errors = Vec::new();
        for longitude in config.longitudes() {
            for band in Band::ALL {
                let key = ObservationKey::new(longitude, band);
                let scans = match find_scans(&target, &key) {
                    Ok(scans) => scans,
                    Err(err) => {
                        self.metrics.record_error();
                        let message = format!("error at {key}: {err}");
                        self.logger.warn(&message);
                        errors.push(message);
                        continue;
                    }
                };
                if scans.is_empty() {
                    self.metrics.record_skipped();
                    continue;
                }

                let written = average_scans(&scans).and_then(|spectrum| {
                    let out = avg_dir.join(key.averaged_file_name());
                    write_spectrum(&out, &spectrum)
                });
                match written {
                    Ok(()) => {
                        self.metrics.record_processed();
                        self.logger.record(&format!(
                            "{key} ({}): averaged {} scans",
                            band.label(),
                            scans.len()
                        ));
                        processed += 1;
                    }
                    Err(err) => {
                        self.metrics.record_error();
                        let message = format!("error at {key}: {err}");
                        self.logger.warn(&message);
                        errors.push(message);
                    }
                }
            }
        }
        self.metrics.report("average");

        Ok(AverageSummary {
            processed,
            avg_dir,
            errors,
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
        self.logger.clear();
    }
}

/// Raw scans for `key` directly inside `target`, sorted by name.
pub fn find_scans(target: &Path, key: &ObservationKey) -> StageResult<Vec<PathBuf>> {
    let root = target.to_str().ok_or_else(|| {
        StageError::InvalidInput(format!("path {} is not valid UTF-8", target.display()))
    })?;
    let pattern = format!("{}/{}", Pattern::escape(root), key.raw_pattern());
    let paths = glob::glob(&pattern).map_err(|err| StageError::Internal(err.to_string()))?;
    let mut scans = Vec::new();
    for entry in paths {
        let path = entry.map_err(glob_error)?;
        if path.is_file() {
            scans.push(path);
        }
    }
    scans.sort();
    Ok(scans)
}

/// Point-wise mean of the amplitudes of `scans`, on the first scan's axis.
///
/// Every scan must share the first scan's frequency axis.
pub fn average_scans(scans: &[PathBuf]) -> StageResult<Spectrum> {
    let spectra = scans
        .iter()
        .map(|path| read_spectrum(path))
        .collect::<StageResult<Vec<_>>>()?;
    let (first, rest) = spectra
        .split_first()
        .ok_or_else(|| StageError::InvalidInput("no scans to average".into()))?;

    for (path, spectrum) in scans.iter().skip(1).zip(rest) {
        if spectrum.len() != first.len() {
            return Err(StageError::InvalidInput(format!(
                "{} has {} rows, expected {}",
                path.display(),
                spectrum.len(),
                first.len()
            )));
        }
        if !StatsHelper::all_close(spectrum.frequency_hz(), first.frequency_hz()) {
            return Err(StageError::InvalidInput(format!(
                "frequency axis of {} differs from {}",
                path.display(),
                scans[0].display()
            )));
        }
    }

    let rows: Vec<&[f64]> = spectra.iter().map(|s| s.amplitude_dbm()).collect();
    let stacked = MatrixHelper::stack_rows(&rows)?;
    let mean = MatrixHelper::column_mean(stacked.view())?;
    Spectrum::new(first.frequency_hz().to_vec(), mean.to_vec())
}

fn purge_averaged(avg_dir: &Path) -> StageResult<usize> {
    let entries = std::fs::read_dir(avg_dir).map_err(|err| StageError::io(avg_dir, err))?;
    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|err| StageError::io(avg_dir, err))?.path();
        let stale = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("_avg.csv"));
        if stale && path.is_file() {
            std::fs::remove_file(&path).map_err(|err| StageError::io(&path, err))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const AXIS: [f64; 3] = [1410e6, 1412e6, 1414e6];

    fn write_scan(dir: &Path, name: &str, freq: &[f64], amp: &[f64]) {
        let spectrum = Spectrum::new(freq.to_vec(), amp.to_vec()).unwrap();
        write_spectrum(&dir.join(name), &spectrum).unwrap();
    }

    fn config(max_angle: u32) -> StageConfig {
        StageConfig {
            max_angle,
            angle_step: 5,
            ..Default::default()
        }
    }

    fn run(dir: &Path, max_angle: u32) -> StageResult<AverageSummary> {
        let mut stage = AverageStage::new();
        stage.initialize(&config(max_angle))?;
        let summary = stage.execute(AverageRequest::new(dir, dir));
        stage.cleanup();
        summary
    }

    #[test]
    fn averages_two_scans_pointwise() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "0.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);
        write_scan(dir.path(), "0.2.csv", &AXIS, &[-42.0, -41.0, -40.0]);

        let summary = run(dir.path(), 0).unwrap();
        assert_eq!(summary.processed, 1);
        assert!(summary.errors.is_empty());

        let averaged = read_spectrum(&summary.avg_dir.join("0_avg.csv")).unwrap();
        assert_eq!(averaged.frequency_hz(), &AXIS);
        assert_eq!(averaged.amplitude_dbm(), &[-41.0, -41.0, -41.0]);
    }

    #[test]
    fn background_band_is_averaged_separately() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "5.1.csv", &AXIS, &[-40.0, -30.0, -41.0]);
        write_scan(dir.path(), "5B.1.csv", &AXIS, &[-41.0, -41.0, -41.0]);
        write_scan(dir.path(), "5B.2.csv", &AXIS, &[-43.0, -43.0, -43.0]);

        let summary = run(dir.path(), 5).unwrap();
        assert_eq!(summary.processed, 2);
        let background = read_spectrum(&summary.avg_dir.join("5B_avg.csv")).unwrap();
        assert_eq!(background.amplitude_dbm(), &[-42.0, -42.0, -42.0]);
    }

    #[test]
    fn scan_order_does_not_change_average() {
        let a = [-40.25, -41.5, -42.125];
        let b = [-42.0, -41.75, -40.5];

        let dir_ab = tempdir().unwrap();
        write_scan(dir_ab.path(), "0.1.csv", &AXIS, &a);
        write_scan(dir_ab.path(), "0.2.csv", &AXIS, &b);
        let dir_ba = tempdir().unwrap();
        write_scan(dir_ba.path(), "0.1.csv", &AXIS, &b);
        write_scan(dir_ba.path(), "0.2.csv", &AXIS, &a);

        let ab = run(dir_ab.path(), 0).unwrap();
        let ba = run(dir_ba.path(), 0).unwrap();
        assert_eq!(
            read_spectrum(&ab.avg_dir.join("0_avg.csv")).unwrap(),
            read_spectrum(&ba.avg_dir.join("0_avg.csv")).unwrap()
        );
    }

    #[test]
    fn rerun_produces_identical_bytes_and_drops_stale_files() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "0.1.csv", &AXIS, &[-40.1, -41.3, -42.7]);
        write_scan(dir.path(), "0.2.csv", &AXIS, &[-42.9, -41.1, -40.3]);

        let first = run(dir.path(), 0).unwrap();
        let out = first.avg_dir.join("0_avg.csv");
        let before = std::fs::read(&out).unwrap();
        std::fs::write(first.avg_dir.join("55_avg.csv"), "stale").unwrap();

        run(dir.path(), 0).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), before);
        assert!(!first.avg_dir.join("55_avg.csv").exists());
    }

    #[test]
    fn mismatched_axes_are_reported_per_key() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "0.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);
        write_scan(
            dir.path(),
            "0.2.csv",
            &[1400e6, 1402e6, 1404e6],
            &[-42.0, -41.0, -40.0],
        );
        write_scan(dir.path(), "5.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);
        write_scan(dir.path(), "5.2.csv", &AXIS[..2], &[-40.0, -41.0]);
        write_scan(dir.path(), "10.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);

        let summary = run(dir.path(), 10).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors.len(), 2);
        assert!(summary.errors[0].contains("frequency axis"));
        assert!(summary.errors[1].contains("rows"));
        assert!(!summary.avg_dir.join("0_avg.csv").exists());
        assert!(summary.avg_dir.join("10_avg.csv").exists());
    }

    #[test]
    fn longitudes_beyond_max_angle_are_ignored() {
        let dir = tempdir().unwrap();
        write_scan(dir.path(), "0.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);
        write_scan(dir.path(), "15.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);
        write_scan(dir.path(), "7.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);

        let summary = run(dir.path(), 10).unwrap();
        assert_eq!(summary.processed, 1);
        assert!(!summary.avg_dir.join("15_avg.csv").exists());
        assert!(!summary.avg_dir.join("7_avg.csv").exists());
    }

    #[cfg(unix)]
    #[test]
    fn scan_discovery_failures_are_reported_per_key() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempdir().unwrap();
        let target = dir.path().join(OsStr::from_bytes(b"set-\xff"));
        std::fs::create_dir(&target).unwrap();
        write_scan(&target, "0.1.csv", &AXIS, &[-40.0, -41.0, -42.0]);

        let summary = run(&target, 5).unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.errors.len(), 4);
        assert!(summary.errors[0].starts_with("error at lon 0"));
    }

    #[test]
    fn missing_target_creates_nothing() {
        let dir = tempdir().unwrap();
        let mut stage = AverageStage::new();
        stage.initialize(&config(10)).unwrap();
        let result = stage.execute(AverageRequest::new(dir.path(), "no-such-set"));
        assert!(matches!(result, Err(StageError::MissingInput(_))));
        assert!(!dir.path().join("no-such-set").exists());
    }

    #[test]
    fn execute_requires_initialize() {
        let dir = tempdir().unwrap();
        let mut stage = AverageStage::new();
        assert!(matches!(
            stage.execute(AverageRequest::new(dir.path(), dir.path())),
            Err(StageError::Internal(_))
        ));
    }
}
