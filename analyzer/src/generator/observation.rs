use anyhow::Context;
use galrotcore::io::{write_spectrum, ReferenceTable, Spectrum};
use galrotcore::prelude::{DEFAULT_TABLE_SPACING_DEG, FMAX_HZ, FMIN_HZ, SPEED_OF_LIGHT};
use galrotcore::processing::convert::LEGACY_EXTENSION;
use galrotcore::records::{Band, ObservationKey};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for generating a synthetic survey.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub max_angle: u32,
    pub angle_step: u32,
    pub scans_per_band: usize,
    pub channels: usize,
    /// Line frequency seen at longitude 0.
    pub line_center_hz: f64,
    pub line_width_hz: f64,
    pub line_height_db: f64,
    pub floor_dbm: f64,
    pub noise_db: f64,
    pub rotation_kms: f64,
    pub sun_distance_ly: f64,
    pub seed: u64,
    /// Write receiver `.tra` exports instead of canonical CSV.
    pub legacy: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_angle: 60,
            angle_step: 5,
            scans_per_band: 2,
            channels: 301,
            line_center_hz: 1415e6,
            line_width_hz: 0.2e6,
            line_height_db: 12.0,
            floor_dbm: -60.0,
            noise_db: 0.3,
            rotation_kms: 220.0,
            sun_distance_ly: 26_000.0,
            seed: 0,
            legacy: false,
        }
    }
}

impl GeneratorConfig {
    fn normalized_channels(&self) -> usize {
        self.channels.max(2)
    }

    fn normalized_step(&self) -> usize {
        self.angle_step.max(1) as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SurveySummary {
    pub scans: usize,
    pub target: PathBuf,
    pub tables_dir: PathBuf,
}

/// Channel frequencies spanning the receiver band.
pub fn frequency_axis(config: &GeneratorConfig) -> Vec<f64> {
    let channels = config.normalized_channels();
    let spacing = (FMAX_HZ - FMIN_HZ) / (channels - 1) as f64;
    (0..channels)
        .map(|channel| FMIN_HZ + channel as f64 * spacing)
        .collect()
}

/// Observed line frequency for a line-of-sight velocity of `V sin(l)`.
pub fn line_frequency(config: &GeneratorConfig, longitude_deg: u32) -> f64 {
    let velocity = config.rotation_kms * 1000.0 * f64::from(longitude_deg).to_radians().sin();
    SPEED_OF_LIGHT * config.line_center_hz / (SPEED_OF_LIGHT - velocity)
}

/// Geometry rows on the default table spacing: `θ = 90° - l`, no observer
/// correction, tangent-point distance `R0 sin(l)`.
pub fn reference_table(config: &GeneratorConfig) -> ReferenceTable {
    let spacing = DEFAULT_TABLE_SPACING_DEG;
    let longitudes: Vec<f64> = (0..=config.max_angle / spacing)
        .map(|row| f64::from(row * spacing))
        .collect();
    ReferenceTable {
        theta: longitudes
            .iter()
            .map(|lon| (90.0 - lon).to_radians())
            .collect(),
        correction: vec![0.0; longitudes.len()],
        distance_ly: longitudes
            .iter()
            .map(|lon| config.sun_distance_ly * lon.to_radians().sin())
            .collect(),
        spacing_deg: spacing,
    }
}

fn build_scan(
    config: &GeneratorConfig,
    axis: &[f64],
    line_hz: Option<f64>,
    rng: &mut StdRng,
) -> anyhow::Result<Spectrum> {
    let span = FMAX_HZ - FMIN_HZ;
    let amplitudes = axis
        .iter()
        .map(|&freq| {
            let continuum = config.floor_dbm + 2.0 * (freq - FMIN_HZ) / span;
            let line = line_hz.map_or(0.0, |center| {
                let offset = (freq - center) / config.line_width_hz;
                config.line_height_db * (-0.5 * offset * offset).exp()
            });
            let jitter = if config.noise_db > 0.0 {
                rng.gen_range(-config.noise_db..config.noise_db)
            } else {
                0.0
            };
            continuum + line + jitter
        })
        .collect();
    Spectrum::new(axis.to_vec(), amplitudes).context("building synthetic spectrum")
}

fn write_legacy(path: &Path, spectrum: &Spectrum) -> anyhow::Result<()> {
    let mut text = String::from("Time,Frequency,Amplitude\n");
    for (index, (freq, amp)) in spectrum
        .frequency_hz()
        .iter()
        .zip(spectrum.amplitude_dbm())
        .enumerate()
    {
        text.push_str(&format!("{index},{freq},{amp}\n"));
    }
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Writes raw scans for every longitude and band into `target` and the
/// matching reference tables into `tables_dir`.
pub fn write_survey(
    config: &GeneratorConfig,
    target: &Path,
    tables_dir: &Path,
) -> anyhow::Result<SurveySummary> {
    fs::create_dir_all(target).with_context(|| format!("creating {}", target.display()))?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let axis = frequency_axis(config);
    let extension = if config.legacy { LEGACY_EXTENSION } else { "csv" };

    let mut scans = 0;
    for longitude in (0..=config.max_angle).step_by(config.normalized_step()) {
        for band in Band::ALL {
            let line_hz = match band {
                Band::OnSource => Some(line_frequency(config, longitude)),
                Band::Background => None,
            };
            let stem = ObservationKey::new(longitude, band).stem();
            for seq in 1..=config.scans_per_band {
                let spectrum = build_scan(config, &axis, line_hz, &mut rng)?;
                let path = target.join(format!("{stem}.{seq}.{extension}"));
                if config.legacy {
                    write_legacy(&path, &spectrum)?;
                } else {
                    write_spectrum(&path, &spectrum)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                scans += 1;
            }
        }
    }

    reference_table(config)
        .write(tables_dir)
        .with_context(|| format!("writing reference tables to {}", tables_dir.display()))?;

    Ok(SurveySummary {
        scans,
        target: target.to_path_buf(),
        tables_dir: tables_dir.to_path_buf(),
    })
}
