pub mod observation;
pub mod result;

pub use observation::{Band, ObservationKey};
pub use result::{PeakRecord, RestFrequency, RestFrequencySource, VelocityRow};
