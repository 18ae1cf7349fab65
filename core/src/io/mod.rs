//! Flat-file formats: canonical spectra, reference tables and result export.

pub mod export;
pub mod spectrum;
pub mod table;

pub use export::{export_velocity_csv, export_velocity_json};
pub use spectrum::{load_averaged, read_spectrum, write_spectrum, LoadOutcome, Spectrum};
pub use table::{ReferenceTable, TableRow};

use crate::prelude::StageError;
use std::path::Path;

/// Header of the frequency column in every canonical spectrum file.
pub const FREQUENCY_COLUMN: &str = "Frequency_Hz";
/// Header of the amplitude column in every canonical spectrum file.
pub const AMPLITUDE_COLUMN: &str = "Amplitude_dBm";

pub(crate) fn glob_error(err: glob::GlobError) -> StageError {
    let path = err.path().to_path_buf();
    StageError::io(path, err.into_error())
}

pub(crate) fn csv_error(path: &Path, err: csv::Error) -> StageError {
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => StageError::io(path, source),
        _ => StageError::parse(path, reason),
    }
}
