use glob::Pattern;
use std::path::{Path, PathBuf};

use crate::io::{glob_error, write_spectrum, Spectrum};
use crate::prelude::{ProcessingStage, StageConfig, StageError, StageResult};
use crate::telemetry::{LogManager, MetricsRecorder};

/// Extension of the receiver's legacy export files.
pub const LEGACY_EXTENSION: &str = "tra";

/// Outcome of a conversion batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub outputs: Vec<PathBuf>,
    pub errors: Vec<String>,
}

/// Rewrites legacy `.tra` exports as canonical `Frequency_Hz,Amplitude_dBm` files.
pub struct ConvertStage {
    config: Option<StageConfig>,
    logger: LogManager,
    metrics: MetricsRecorder,
}

impl ConvertStage {
    pub fn new() -> Self {
        Self {
            config: None,
            logger: LogManager::new("galrotcore::convert"),
            metrics: MetricsRecorder::new(),
        }
    }
}

impl Default for ConvertStage {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStage for ConvertStage {
    type Input = PathBuf;
    type Output = ConversionSummary;

    fn initialize(&mut self, config: &StageConfig) -> StageResult<()> {
        self.config = Some(config.clone());
        self.logger.clear();
        self.metrics.reset();
        Ok(())
    }

    fn execute(&mut self, dir: PathBuf) -> StageResult<ConversionSummary> {
        if self.config.is_none() {
            return Err(StageError::Internal("stage not initialized".into()));
        }
        if !dir.is_dir() {
            return Err(StageError::MissingInput(format!(
                "data folder {} does not exist",
                dir.display()
            )));
        }

        let files = find_legacy_files(&dir)?;
        if files.is_empty() {
            return Err(StageError::NoInputFiles {
                dir,
                extension: LEGACY_EXTENSION.to_string(),
            });
        }

        let mut summary = ConversionSummary::default();
        for file in files {
            match convert_file(&file) {
                Ok(output) => {
                    self.metrics.record_processed();
                    summary.converted += 1;
                    summary.outputs.push(output);
                }
                Err(err) => {
                    self.metrics.record_error();
                    let name = file.file_name().unwrap_or_default().to_string_lossy();
                    let message = format!("conversion failed: {name} -> {err}");
                    self.logger.warn(&message);
                    summary.errors.push(message);
                }
            }
        }
        self.metrics.report("convert");
        self.logger
            .record(&format!("converted {} legacy files", summary.converted));
        Ok(summary)
    }

    fn cleanup(&mut self) {
        self.config = None;
        self.logger.clear();
    }
}

fn convert_file(input: &Path) -> StageResult<PathBuf> {
    let text = std::fs::read_to_string(input).map_err(|err| StageError::io(input, err))?;
    let spectrum = parse_legacy(&text)?;
    let output = input.with_extension("csv");
    write_spectrum(&output, &spectrum)?;
    Ok(output)
}

/// Recursively lists `*.tra` files under `dir`, sorted.
pub fn find_legacy_files(dir: &Path) -> StageResult<Vec<PathBuf>> {
    let root = dir.to_str().ok_or_else(|| {
        StageError::InvalidInput(format!("path {} is not valid UTF-8", dir.display()))
    })?;
    let pattern = format!("{}/**/*.{}", Pattern::escape(root), LEGACY_EXTENSION);
    let paths = glob::glob(&pattern).map_err(|err| StageError::Internal(err.to_string()))?;
    let mut files = paths
        .map(|entry| entry.map_err(glob_error))
        .collect::<StageResult<Vec<PathBuf>>>()?;
    files.sort();
    Ok(files)
}

/// Parses a legacy export: one header line, then rows whose second and third
/// fields are frequency and amplitude. Rows that do not parse are dropped.
pub fn parse_legacy(text: &str) -> StageResult<Spectrum> {
    let (frequency_hz, amplitude_dbm): (Vec<f64>, Vec<f64>) = text
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields = legacy_fields(line);
            if fields.len() < 3 {
                return None;
            }
            let frequency = fields[1].parse::<f64>().ok()?;
            let amplitude = fields[2].parse::<f64>().ok()?;
            Some((frequency, amplitude))
        })
        .unzip();
    Spectrum::new(frequency_hz, amplitude_dbm)
}

fn legacy_fields(line: &str) -> Vec<&str> {
    if line.contains(',') {
        line.split(',').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_spectrum;
    use tempfile::tempdir;

    fn run(dir: &Path) -> StageResult<ConversionSummary> {
        let mut stage = ConvertStage::new();
        stage.initialize(&StageConfig::default())?;
        let summary = stage.execute(dir.to_path_buf());
        stage.cleanup();
        summary
    }

    #[test]
    fn converts_two_row_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("0.1.tra"),
            "time,freq,amp\nt,1.0e9,-50.0\nt,1.0e9,-50.0\n",
        )
        .unwrap();

        let summary = run(dir.path()).unwrap();
        assert_eq!(summary.converted, 1);
        assert!(summary.errors.is_empty());

        let spectrum = read_spectrum(&dir.path().join("0.1.csv")).unwrap();
        assert_eq!(spectrum.frequency_hz(), &[1.0e9, 1.0e9]);
        assert_eq!(spectrum.amplitude_dbm(), &[-50.0, -50.0]);
    }

    #[test]
    fn unparsable_rows_are_dropped_silently() {
        let text = "header\n0 1.41e9 -40\nshort row\nx,abc,-41\n1\t1.42e9\t-42\n";
        let spectrum = parse_legacy(text).unwrap();
        assert_eq!(spectrum.frequency_hz(), &[1.41e9, 1.42e9]);
        assert_eq!(spectrum.amplitude_dbm(), &[-40.0, -42.0]);
    }

    #[test]
    fn file_without_valid_rows_still_gets_header() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0.1.tra"), "time,freq,amp\nbad,row\n").unwrap();

        let summary = run(dir.path()).unwrap();
        assert_eq!(summary.converted, 1);
        let text = std::fs::read_to_string(dir.path().join("0.1.csv")).unwrap();
        assert_eq!(text.trim_end(), "Frequency_Hz,Amplitude_dBm");
        assert!(read_spectrum(&dir.path().join("0.1.csv")).unwrap().is_empty());
    }

    #[test]
    fn searches_subfolders() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("day1");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("5B.1.tra"), "h\n0,1.41e9,-40\n").unwrap();

        let summary = run(dir.path()).unwrap();
        assert_eq!(summary.converted, 1);
        assert!(nested.join("5B.1.csv").is_file());
    }

    #[test]
    fn empty_folder_reports_no_input_files() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            run(dir.path()),
            Err(StageError::NoInputFiles { .. })
        ));
    }

    #[test]
    fn unreadable_file_is_logged_and_batch_continues() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0.1.tra"), "h\n0,1.41e9,-40\n").unwrap();
        std::fs::write(dir.path().join("0.2.tra"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let summary = run(dir.path()).unwrap();
        assert_eq!(summary.converted, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("0.2.tra"));
    }
}
