use encoding_rs::SHIFT_JIS;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{csv_error, LoadOutcome};
use crate::prelude::{StageError, StageResult};

/// Geometric angle table, first column.
pub const THETA_FILE: &str = "θ_o表.csv";
/// Observer-motion correction table, first column.
pub const CORRECTION_FILE: &str = "E_s表.csv";
/// Distance-from-centre table, second column.
pub const DISTANCE_FILE: &str = "中心距離標.csv";

/// Longitude-indexed geometry shared by every analysis.
///
/// The three columns are not required to have the same length; [`row`]
/// only answers for indices that are valid in all of them.
///
/// [`row`]: ReferenceTable::row
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceTable {
    pub theta: Vec<f64>,
    pub correction: Vec<f64>,
    pub distance_ly: Vec<f64>,
    pub spacing_deg: u32,
}

/// One looked-up row of the reference table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableRow {
    pub theta: f64,
    pub correction: f64,
    pub distance_ly: f64,
}

impl ReferenceTable {
    /// Reads the three Shift-JIS tables from `dir`.
    ///
    /// Any absent file yields `NotFound` naming it; malformed content is an
    /// error.
    pub fn load(dir: &Path, spacing_deg: u32) -> StageResult<LoadOutcome<Self>> {
        let columns = [(THETA_FILE, 0), (CORRECTION_FILE, 0), (DISTANCE_FILE, 1)];
        let mut loaded = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            let path = dir.join(name);
            match read_shift_jis(&path)? {
                LoadOutcome::Found(text) => loaded.push(parse_column(&path, &text, column)?),
                LoadOutcome::NotFound(missing) => return Ok(LoadOutcome::NotFound(missing)),
            }
        }
        let distance_ly = loaded.pop().unwrap_or_default();
        let correction = loaded.pop().unwrap_or_default();
        let theta = loaded.pop().unwrap_or_default();
        Ok(LoadOutcome::Found(Self {
            theta,
            correction,
            distance_ly,
            spacing_deg,
        }))
    }

    /// Number of rows valid in all three columns.
    pub fn len(&self) -> usize {
        self.theta
            .len()
            .min(self.correction.len())
            .min(self.distance_ly.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row(&self, index: usize) -> Option<TableRow> {
        Some(TableRow {
            theta: *self.theta.get(index)?,
            correction: *self.correction.get(index)?,
            distance_ly: *self.distance_ly.get(index)?,
        })
    }

    /// Row index for a longitude. Longitudes off the table grid have none.
    pub fn index_for(&self, longitude_deg: u32) -> Option<usize> {
        if self.spacing_deg == 0 || longitude_deg % self.spacing_deg != 0 {
            return None;
        }
        Some((longitude_deg / self.spacing_deg) as usize)
    }

    /// The caller's longitude step must land on table rows.
    pub fn check_step(&self, angle_step: u32) -> StageResult<()> {
        if self.spacing_deg == 0 || angle_step == 0 || angle_step % self.spacing_deg != 0 {
            return Err(StageError::Config(format!(
                "angle step {angle_step} is not a multiple of the reference table spacing {}",
                self.spacing_deg
            )));
        }
        Ok(())
    }

    /// Writes the three tables into `dir` in the layout [`load`] expects.
    ///
    /// [`load`]: ReferenceTable::load
    pub fn write(&self, dir: &Path) -> StageResult<()> {
        std::fs::create_dir_all(dir).map_err(|err| StageError::io(dir, err))?;
        let theta: Vec<String> = self.theta.iter().map(f64::to_string).collect();
        let correction: Vec<String> = self.correction.iter().map(f64::to_string).collect();
        let distance: Vec<String> = self
            .distance_ly
            .iter()
            .enumerate()
            .map(|(row, d)| format!("{},{}", row as u32 * self.spacing_deg, d))
            .collect();
        write_shift_jis(&dir.join(THETA_FILE), "θ_o", &theta)?;
        write_shift_jis(&dir.join(CORRECTION_FILE), "E_s", &correction)?;
        write_shift_jis(&dir.join(DISTANCE_FILE), "銀経,中心距離[光年]", &distance)
    }
}

fn write_shift_jis(path: &Path, header: &str, lines: &[String]) -> StageResult<()> {
    let mut text = String::from(header);
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    let (bytes, _, _) = SHIFT_JIS.encode(&text);
    std::fs::write(path, bytes).map_err(|err| StageError::io(path, err))
}

fn read_shift_jis(path: &Path) -> StageResult<LoadOutcome<String>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Ok(LoadOutcome::NotFound(PathBuf::from(path)))
        }
        Err(err) => return Err(StageError::io(path, err)),
    };
    let (text, _, had_errors) = SHIFT_JIS.decode(&bytes);
    if had_errors {
        return Err(StageError::parse(path, "not valid Shift-JIS text"));
    }
    Ok(LoadOutcome::Found(text.into_owned()))
}

fn parse_column(path: &Path, text: &str, column: usize) -> StageResult<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut values = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|err| csv_error(path, err))?;
        let cell = record.get(column).ok_or_else(|| {
            StageError::parse(path, format!("row {row_no} has no column {column}"))
        })?;
        let value = cell.trim().parse::<f64>().map_err(|err| {
            StageError::parse(path, format!("row {row_no}: '{cell}' is not a number ({err})"))
        })?;
        values.push(value);
    }
    Ok(values)
}
