pub mod average;
pub mod convert;
pub mod peak;
pub mod velocity;

pub use average::{AverageRequest, AverageStage, AverageSummary};
pub use convert::{ConversionSummary, ConvertStage};
pub use peak::{PeakMode, PeakSet, PeakStage};
pub use velocity::{VelocityReport, VelocityStage};
