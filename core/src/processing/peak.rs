use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::{load_averaged, LoadOutcome, Spectrum};
use crate::math::StatsHelper;
use crate::prelude::{FrequencyWindow, ProcessingStage, StageConfig, StageError, StageResult};
use crate::records::{Band, ObservationKey, PeakRecord, RestFrequency};
use crate::telemetry::{LogManager, MetricsRecorder};

/// How the continuum is removed before searching for the line peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PeakMode {
    /// Subtract the averaged background band from the on-source band.
    #[default]
    BackgroundSubtraction,
    /// On-source band only, minus the median inside the window.
    MedianBaseline,
}

/// Peaks found across the longitude grid plus the derived rest frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakSet {
    pub records: Vec<PeakRecord>,
    pub rest_frequency: RestFrequency,
    pub logs: Vec<String>,
}

pub struct PeakStage {
    mode: PeakMode,
    config: Option<StageConfig>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl PeakStage {
    pub fn new(mode: PeakMode) -> Self {
        Self {
            mode,
            config: None,
            logger: LogManager::new("galrotcore::peak"),
            metrics: MetricsRecorder::new(),
        }
    }

    /// Loads one averaged spectrum, logging why it is unusable.
    fn load(&mut self, avg_dir: &Path, key: ObservationKey) -> Option<Spectrum> {
        match load_averaged(avg_dir, &key) {
            Ok(LoadOutcome::Found(spectrum)) => Some(spectrum),
            Ok(LoadOutcome::NotFound(_)) => None,
            Err(err) => {
                self.metrics.record_error();
                self.logger
                    .warn(&format!("{key}: unreadable averaged spectrum: {err}"));
                None
            }
        }
    }

    fn subtracted(&mut self, avg_dir: &Path, longitude: u32) -> Option<Spectrum> {
        let on = self.load(avg_dir, ObservationKey::new(longitude, Band::OnSource));
        let background = self.load(avg_dir, ObservationKey::new(longitude, Band::Background));
        let (Some(on), Some(background)) = (on, background) else {
            self.logger
                .record(&format!("lon {longitude}°: insufficient data"));
            return None;
        };
        if !StatsHelper::all_close(on.frequency_hz(), background.frequency_hz()) {
            self.logger
                .record(&format!("lon {longitude}°: frequency axis mismatch"));
            return None;
        }
        let difference = on
            .amplitude_dbm()
            .iter()
            .zip(background.amplitude_dbm())
            .map(|(a, b)| a - b)
            .collect();
        Spectrum::new(on.frequency_hz().to_vec(), difference).ok()
    }

    fn on_source(&mut self, avg_dir: &Path, longitude: u32) -> Option<Spectrum> {
        let spectrum = self.load(avg_dir, ObservationKey::new(longitude, Band::OnSource));
        if spectrum.is_none() {
            self.logger
                .record(&format!("lon {longitude}°: insufficient data"));
        }
        spectrum
    }
}

impl ProcessingStage for PeakStage {
    type Input = PathBuf;
    type Output = PeakSet;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        config.validate()?;
        self.config = Some(config.clone());
        self.logger.clear();
        self.metrics.reset();
        Ok(())
    }

    fn execute(&mut self, avg_dir: PathBuf) -> StageResult<PeakSet> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| StageError::Internal("stage not initialized".into()))?;

        if !avg_dir.is_dir() {
            return Err(StageError::MissingInput(format!(
                "{} not found; run averaging first",
                avg_dir.display()
            )));
        }

        let mut records = Vec::new();
        for longitude in config.longitudes() {
            let spectrum = match self.mode {
                PeakMode::BackgroundSubtraction => self.subtracted(&avg_dir, longitude),
                PeakMode::MedianBaseline => self.on_source(&avg_dir, longitude),
            };
            let Some(spectrum) = spectrum else {
                self.metrics.record_skipped();
                continue;
            };

            let baseline = self.mode == PeakMode::MedianBaseline;
            match find_peak(&spectrum, &config.window, baseline) {
                Some(peak_frequency_hz) => {
                    self.metrics.record_processed();
                    records.push(PeakRecord::new(longitude, peak_frequency_hz));
                }
                None => {
                    self.metrics.record_skipped();
                    self.logger
                        .record(&format!("lon {longitude}°: no samples in peak window"));
                }
            }
        }
        self.metrics.report("peak");

        if records.is_empty() {
            return Err(StageError::NoPeakDetected);
        }

        let rest_frequency = RestFrequency::from_peaks(&records, config.rest_frequency_fallback_hz);
        if rest_frequency.is_fallback() {
            self.logger.warn(&format!(
                "no peak at lon 0°; using fallback rest frequency {} Hz",
                rest_frequency.hz
            ));
        }

        Ok(PeakSet {
            records,
            rest_frequency,
            logs: self.logger.take(),
        })
    }

    fn cleanup(&mut self) {
        self.config = None;
        self.logger.clear();
    }
}

/// Frequency of the first amplitude maximum inside `window`.
///
/// With `median_baseline` the window median is subtracted first. `None` when
/// the window holds no samples.
pub fn find_peak(spectrum: &Spectrum, window: &FrequencyWindow, median_baseline: bool) -> Option<f64> {
    let (frequencies, mut amplitudes) = spectrum.windowed(window);
    if median_baseline {
        let median = StatsHelper::median(&amplitudes)?;
        amplitudes.iter_mut().for_each(|amp| *amp -= median);
    }
    let idx = StatsHelper::argmax(&amplitudes)?;
    Some(frequencies[idx])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::write_spectrum;
    use crate::records::RestFrequencySource;
    use tempfile::tempdir;

    const AXIS: [f64; 3] = [1410e6, 1412e6, 1414e6];

    fn write_avg(dir: &Path, name: &str, freq: &[f64], amp: &[f64]) {
        let spectrum = Spectrum::new(freq.to_vec(), amp.to_vec()).unwrap();
        write_spectrum(&dir.join(name), &spectrum).unwrap();
    }

    fn run(dir: &Path, mode: PeakMode, max_angle: u32) -> StageResult<PeakSet> {
        let mut stage = PeakStage::new(mode);
        stage.initialize(&StageConfig {
            max_angle,
            angle_step: 5,
            ..Default::default()
        })?;
        let result = stage.execute(dir.to_path_buf());
        stage.cleanup();
        result
    }

    #[test]
    fn background_subtraction_peaks_at_largest_difference() {
        let dir = tempdir().unwrap();
        write_avg(dir.path(), "0_avg.csv", &AXIS, &[-40.0, -30.0, -41.0]);
        write_avg(dir.path(), "0B_avg.csv", &AXIS, &[-41.0, -41.0, -41.0]);

        let peaks = run(dir.path(), PeakMode::BackgroundSubtraction, 0).unwrap();
        assert_eq!(peaks.records, vec![PeakRecord::new(0, 1412e6)]);
        assert_eq!(peaks.rest_frequency.hz, 1412e6);
        assert_eq!(
            peaks.rest_frequency.source,
            RestFrequencySource::Measured { samples: 1 }
        );
    }

    #[test]
    fn missing_background_is_logged_as_insufficient_data() {
        let dir = tempdir().unwrap();
        write_avg(dir.path(), "0_avg.csv", &AXIS, &[-40.0, -30.0, -41.0]);
        write_avg(dir.path(), "0B_avg.csv", &AXIS, &[-41.0, -41.0, -41.0]);
        write_avg(dir.path(), "5_avg.csv", &AXIS, &[-40.0, -30.0, -41.0]);

        let peaks = run(dir.path(), PeakMode::BackgroundSubtraction, 5).unwrap();
        assert_eq!(peaks.records.len(), 1);
        assert!(peaks
            .logs
            .iter()
            .any(|entry| entry.contains("lon 5°: insufficient data")));
    }

    #[test]
    fn axis_mismatch_skips_longitude() {
        let dir = tempdir().unwrap();
        write_avg(dir.path(), "0_avg.csv", &AXIS, &[-40.0, -30.0, -41.0]);
        write_avg(
            dir.path(),
            "0B_avg.csv",
            &[1406e6, 1408e6, 1409e6],
            &[-41.0, -41.0, -41.0],
        );
        write_avg(dir.path(), "5_avg.csv", &AXIS, &[-40.0, -41.0, -30.0]);
        write_avg(dir.path(), "5B_avg.csv", &AXIS, &[-41.0, -41.0, -41.0]);

        let peaks = run(dir.path(), PeakMode::BackgroundSubtraction, 5).unwrap();
        assert_eq!(peaks.records, vec![PeakRecord::new(5, 1414e6)]);
        assert!(peaks
            .logs
            .iter()
            .any(|entry| entry.contains("frequency axis mismatch")));
        assert!(peaks.rest_frequency.is_fallback());
        assert_eq!(peaks.rest_frequency.hz, crate::prelude::HI_REST_FREQUENCY_HZ);
        assert!(peaks.logs.iter().any(|entry| entry.starts_with("WARN:")));
    }

    #[test]
    fn longitudes_beyond_max_angle_are_never_reported() {
        let dir = tempdir().unwrap();
        for lon in [0, 15] {
            write_avg(dir.path(), &format!("{lon}_avg.csv"), &AXIS, &[-40.0, -30.0, -41.0]);
            write_avg(dir.path(), &format!("{lon}B_avg.csv"), &AXIS, &[-41.0, -41.0, -41.0]);
        }

        let peaks = run(dir.path(), PeakMode::BackgroundSubtraction, 10).unwrap();
        assert_eq!(peaks.records, vec![PeakRecord::new(0, 1412e6)]);
        assert!(peaks.logs.iter().all(|entry| !entry.contains("15")));
    }

    #[test]
    fn empty_window_everywhere_is_no_peak() {
        let dir = tempdir().unwrap();
        let outside = [1400e6, 1401e6, 1402e6];
        write_avg(dir.path(), "0_avg.csv", &outside, &[-40.0, -30.0, -41.0]);
        write_avg(dir.path(), "0B_avg.csv", &outside, &[-41.0, -41.0, -41.0]);

        assert!(matches!(
            run(dir.path(), PeakMode::BackgroundSubtraction, 0),
            Err(StageError::NoPeakDetected)
        ));
    }

    #[test]
    fn median_baseline_uses_on_source_only() {
        let dir = tempdir().unwrap();
        write_avg(
            dir.path(),
            "0_avg.csv",
            &[1404e6, 1410e6, 1412e6, 1414e6],
            &[0.0, -45.0, -44.0, -20.0],
        );
        write_avg(dir.path(), "10_avg.csv", &AXIS, &[-40.0, -35.0, -41.0]);

        let peaks = run(dir.path(), PeakMode::MedianBaseline, 10).unwrap();
        assert_eq!(
            peaks.records,
            vec![PeakRecord::new(0, 1414e6), PeakRecord::new(10, 1412e6)]
        );
        assert!(peaks.logs.iter().any(|entry| entry.contains("lon 5°")));
    }

    #[test]
    fn missing_avg_dir_asks_for_averaging() {
        let dir = tempdir().unwrap();
        let err = run(&dir.path().join("avg"), PeakMode::MedianBaseline, 0).unwrap_err();
        assert!(err.to_string().contains("run averaging first"));
    }

    #[test]
    fn find_peak_subtracts_median() {
        let spectrum = Spectrum::new(AXIS.to_vec(), vec![-50.0, -52.0, -49.0]).unwrap();
        assert_eq!(
            find_peak(&spectrum, &FrequencyWindow::default(), true),
            Some(1414e6)
        );
    }
}
