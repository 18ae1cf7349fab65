use serde::{Deserialize, Serialize};
use std::fmt;

/// Which receiver band a spectrum was taken in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    /// On-source pointing ("B0").
    OnSource,
    /// Off-source background pointing ("B5").
    Background,
}

impl Band {
    pub const ALL: [Band; 2] = [Band::OnSource, Band::Background];

    /// File-name suffix following the longitude.
    pub fn suffix(self) -> &'static str {
        match self {
            Band::OnSource => "",
            Band::Background => "B",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::OnSource => "B0",
            Band::Background => "B5",
        }
    }
}

/// Identifies a raw file group and the averaged spectrum produced from it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationKey {
    pub longitude_deg: u32,
    pub band: Band,
}

impl ObservationKey {
    pub fn new(longitude_deg: u32, band: Band) -> Self {
        Self {
            longitude_deg,
            band,
        }
    }

    /// `<lon><suffix>`, the stem shared by raw and averaged files.
    pub fn stem(&self) -> String {
        format!("{}{}", self.longitude_deg, self.band.suffix())
    }

    /// Glob for the raw scans of this key: `<lon><suffix>.*.csv`.
    pub fn raw_pattern(&self) -> String {
        format!("{}.*.csv", self.stem())
    }

    /// `<lon><suffix>_avg.csv`.
    pub fn averaged_file_name(&self) -> String {
        format!("{}_avg.csv", self.stem())
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lon {}{}", self.longitude_deg, self.band.suffix())
    }
}
