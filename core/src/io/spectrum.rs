use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{csv_error, AMPLITUDE_COLUMN, FREQUENCY_COLUMN};
use crate::prelude::{FrequencyWindow, StageError, StageResult};
use crate::records::ObservationKey;

/// Result of looking up a file that may legitimately be absent.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<T> {
    Found(T),
    NotFound(PathBuf),
}

impl<T> LoadOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            LoadOutcome::Found(value) => Some(value),
            LoadOutcome::NotFound(_) => None,
        }
    }
}

/// Amplitude against frequency. Both axes have the same length and the
/// frequency axis is assumed ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    frequency_hz: Vec<f64>,
    amplitude_dbm: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SpectrumRow {
    #[serde(rename = "Frequency_Hz")]
    frequency_hz: f64,
    #[serde(rename = "Amplitude_dBm")]
    amplitude_dbm: f64,
}

impl Spectrum {
    pub fn new(frequency_hz: Vec<f64>, amplitude_dbm: Vec<f64>) -> StageResult<Self> {
        if frequency_hz.len() != amplitude_dbm.len() {
            return Err(StageError::InvalidInput(format!(
                "frequency axis has {} points but amplitude has {}",
                frequency_hz.len(),
                amplitude_dbm.len()
            )));
        }
        Ok(Self {
            frequency_hz,
            amplitude_dbm,
        })
    }

    pub fn frequency_hz(&self) -> &[f64] {
        &self.frequency_hz
    }

    pub fn amplitude_dbm(&self) -> &[f64] {
        &self.amplitude_dbm
    }

    pub fn len(&self) -> usize {
        self.frequency_hz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequency_hz.is_empty()
    }

    /// Points whose frequency lies inside `window`, as (frequencies, amplitudes).
    pub fn windowed(&self, window: &FrequencyWindow) -> (Vec<f64>, Vec<f64>) {
        self.frequency_hz
            .iter()
            .zip(&self.amplitude_dbm)
            .filter(|(freq, _)| window.contains(**freq))
            .map(|(&freq, &amp)| (freq, amp))
            .unzip()
    }
}

/// Reads a `Frequency_Hz,Amplitude_dBm` file. Extra columns are ignored.
pub fn read_spectrum(path: &Path) -> StageResult<Spectrum> {
    let mut reader = csv::Reader::from_path(path).map_err(|err| csv_error(path, err))?;
    let mut frequency_hz = Vec::new();
    let mut amplitude_dbm = Vec::new();
    for row in reader.deserialize::<SpectrumRow>() {
        let row = row.map_err(|err| csv_error(path, err))?;
        frequency_hz.push(row.frequency_hz);
        amplitude_dbm.push(row.amplitude_dbm);
    }
    Spectrum::new(frequency_hz, amplitude_dbm)
}

/// Writes `spectrum` with the canonical header, replacing any existing file.
pub fn write_spectrum(path: &Path, spectrum: &Spectrum) -> StageResult<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|err| csv_error(path, err))?;
    writer
        .write_record([FREQUENCY_COLUMN, AMPLITUDE_COLUMN])
        .map_err(|err| csv_error(path, err))?;
    for (&frequency_hz, &amplitude_dbm) in spectrum.frequency_hz.iter().zip(&spectrum.amplitude_dbm)
    {
        writer
            .serialize(SpectrumRow {
                frequency_hz,
                amplitude_dbm,
            })
            .map_err(|err| csv_error(path, err))?;
    }
    writer.flush().map_err(|err| StageError::io(path, err))
}

/// Loads the averaged spectrum for `key` from `avg_dir`.
///
/// An absent file is `Ok(LoadOutcome::NotFound)`; a file that exists but
/// cannot be parsed is an error.
pub fn load_averaged(avg_dir: &Path, key: &ObservationKey) -> StageResult<LoadOutcome<Spectrum>> {
    let path = avg_dir.join(key.averaged_file_name());
    if !path.is_file() {
        return Ok(LoadOutcome::NotFound(path));
    }
    read_spectrum(&path).map(LoadOutcome::Found)
}
