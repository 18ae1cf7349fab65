use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::prelude::{StageError, StageResult};

pub struct MatrixHelper;

impl MatrixHelper {
    /// Stacks equal-length rows into a 2D array.
    pub fn stack_rows(rows: &[&[f64]]) -> StageResult<Array2<f64>> {
        let width = rows.first().map(|row| row.len()).unwrap_or(0);
        if let Some(bad) = rows.iter().position(|row| row.len() != width) {
            return Err(StageError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                width
            )));
        }
        let flat: Vec<f64> = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|err| StageError::Internal(err.to_string()))
    }

    /// Arithmetic mean of each column.
    pub fn column_mean(matrix: ArrayView2<f64>) -> StageResult<Array1<f64>> {
        matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| StageError::InvalidInput("cannot average zero rows".into()))
    }
}
