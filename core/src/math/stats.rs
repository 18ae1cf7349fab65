use std::cmp::Ordering;

/// Relative tolerance used when comparing frequency axes.
pub const AXIS_RTOL: f64 = 1e-5;
/// Absolute tolerance used when comparing frequency axes.
pub const AXIS_ATOL: f64 = 1e-8;

pub struct StatsHelper;

impl StatsHelper {
    pub fn mean(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        Some(samples.iter().sum::<f64>() / samples.len() as f64)
    }

    /// Median, averaging the two middle values for even counts.
    pub fn median(samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some(0.5 * (sorted[mid - 1] + sorted[mid]))
        } else {
            Some(sorted[mid])
        }
    }

    /// Index of the first maximum. NaN samples never win.
    pub fn argmax(samples: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &value) in samples.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            match best {
                Some((_, current)) if value <= current => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Element-wise `|a - b| <= atol + rtol * |b|`; unequal lengths are never close.
    pub fn all_close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|(&x, &y)| (x - y).abs() <= AXIS_ATOL + AXIS_RTOL * y.abs())
    }
}
