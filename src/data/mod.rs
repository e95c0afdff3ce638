//! Value objects exposed to collaborators.

pub mod reading;
pub mod snapshot;

pub use reading::{SensorError, TemperatureReading};
pub use snapshot::{DeviceSnapshot, RecordingMode};
