//! Processing core for HI galactic-rotation surveys.
//!
//! Raw spectra taken at a grid of galactic longitudes are averaged per
//! longitude and band, the 21 cm line peak is located in each averaged
//! spectrum, and the Doppler shift against the longitude-0 reference is turned
//! into a rotation speed through a longitude-indexed geometry table.

pub mod io;
pub mod math;
pub mod pipeline;
pub mod prelude;
pub mod processing;
pub mod records;
pub mod telemetry;

pub use prelude::{ProcessingStage, StageConfig, StageError, StageResult};
