use encoding_rs::SHIFT_JIS;
use std::path::Path;

use super::csv_error;
use crate::prelude::{StageError, StageResult};
use crate::records::VelocityRow;

/// Column headers of the rotation-curve spreadsheet.
pub const EXPORT_HEADER: [&str; 3] = ["銀経", "中心距離[光年]", "回転速度[km/s]"];

/// Writes the rotation curve as Shift-JIS CSV. Undefined speeds are empty cells.
pub fn export_velocity_csv(rows: &[VelocityRow], path: &Path) -> StageResult<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(EXPORT_HEADER)
        .map_err(|err| csv_error(path, err))?;
    for row in rows {
        let speed = row.speed_kms.map(|v| v.to_string()).unwrap_or_default();
        writer
            .write_record([
                row.longitude_deg.to_string(),
                row.distance_ly.to_string(),
                speed,
            ])
            .map_err(|err| csv_error(path, err))?;
    }
    let buffer = writer
        .into_inner()
        .map_err(|err| StageError::Internal(err.to_string()))?;
    let text = String::from_utf8(buffer).map_err(|err| StageError::Internal(err.to_string()))?;
    let (encoded, _, _) = SHIFT_JIS.encode(&text);
    write_creating_parent(path, &encoded)
}

/// Writes the rotation curve as pretty-printed JSON.
pub fn export_velocity_json(rows: &[VelocityRow], path: &Path) -> StageResult<()> {
    let json = serde_json::to_vec_pretty(rows).map_err(|err| StageError::parse(path, err))?;
    write_creating_parent(path, &json)
}

fn write_creating_parent(path: &Path, bytes: &[u8]) -> StageResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| StageError::io(parent, err))?;
    }
    std::fs::write(path, bytes).map_err(|err| StageError::io(path, err))
}
