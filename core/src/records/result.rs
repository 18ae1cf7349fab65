use serde::{Deserialize, Serialize};

use crate::math::StatsHelper;

/// Peak frequency found for one longitude.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeakRecord {
    pub longitude_deg: u32,
    pub peak_frequency_hz: f64,
}

impl PeakRecord {
    pub fn new(longitude_deg: u32, peak_frequency_hz: f64) -> Self {
        Self {
            longitude_deg,
            peak_frequency_hz,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestFrequencySource {
    /// Mean of the longitude-0 peaks.
    Measured { samples: usize },
    /// Configured constant, used when longitude 0 produced no peak.
    Fallback,
}

/// Zero-velocity reference frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RestFrequency {
    pub hz: f64,
    pub source: RestFrequencySource,
}

impl RestFrequency {
    /// Averages the longitude-0 peaks, or falls back to `fallback_hz`.
    pub fn from_peaks(peaks: &[PeakRecord], fallback_hz: f64) -> Self {
        let reference: Vec<f64> = peaks
            .iter()
            .filter(|peak| peak.longitude_deg == 0)
            .map(|peak| peak.peak_frequency_hz)
            .collect();
        match StatsHelper::mean(&reference) {
            Some(hz) => Self {
                hz,
                source: RestFrequencySource::Measured {
                    samples: reference.len(),
                },
            },
            None => Self {
                hz: fallback_hz,
                source: RestFrequencySource::Fallback,
            },
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == RestFrequencySource::Fallback
    }
}

/// One row of the rotation curve. `speed_kms` is `None` when the viewing
/// geometry is degenerate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct VelocityRow {
    pub longitude_deg: u32,
    pub distance_ly: f64,
    pub speed_kms: Option<f64>,
}

impl VelocityRow {
    pub fn speed_label(&self) -> String {
        match self.speed_kms {
            Some(speed) => format!("{speed:.3}"),
            None => "undefined".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_frequency_averages_longitude_zero() {
        let peaks = [
            PeakRecord::new(0, 1420.0e6),
            PeakRecord::new(5, 1419.0e6),
            PeakRecord::new(0, 1420.2e6),
        ];
        let rest = RestFrequency::from_peaks(&peaks, 1.0);
        assert!((rest.hz - 1420.1e6).abs() < 1e-3);
        assert_eq!(rest.source, RestFrequencySource::Measured { samples: 2 });
    }

    #[test]
    fn rest_frequency_falls_back_without_longitude_zero() {
        let peaks = [PeakRecord::new(5, 1419.0e6)];
        let rest = RestFrequency::from_peaks(&peaks, 1420.40575177e6);
        assert!(rest.is_fallback());
        assert_eq!(rest.hz, 1420.40575177e6);
    }

    #[test]
    fn undefined_speed_is_labelled() {
        let row = VelocityRow {
            longitude_deg: 0,
            distance_ly: 0.0,
            speed_kms: None,
        };
        assert_eq!(row.speed_label(), "undefined");
    }
}
