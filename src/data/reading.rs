//! Temperature reading value object.

use chrono::{DateTime, Utc};

use crate::utils::celsius_to_fahrenheit;

/// Fault condition reported by a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorError {
    /// Sensor open circuit / unplugged.
    Disconnected,
    /// Reading above the sensor's range.
    OverRange,
    /// Reading below the sensor's range.
    UnderRange,
}

impl std::fmt::Display for SensorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "sensor disconnected"),
            Self::OverRange => write!(f, "over range"),
            Self::UnderRange => write!(f, "under range"),
        }
    }
}

/// One decoded temperature sample.
///
/// Immutable once created. Produced only by the packet parser and the
/// session's current-value decoding.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TemperatureReading {
    /// When the sample was decoded.
    pub captured_at: DateTime<Utc>,
    /// Channel the device attributed the sample to, if it reports one.
    pub channel: Option<u16>,
    /// Temperature in degrees Celsius.
    pub value_celsius: f64,
    /// Sensor fault, if the device flagged one.
    pub error: Option<SensorError>,
}

impl TemperatureReading {
    /// Create a reading stamped with the current time.
    pub fn new(channel: Option<u16>, value_celsius: f64, error: Option<SensorError>) -> Self {
        Self {
            captured_at: Utc::now(),
            channel,
            value_celsius,
            error,
        }
    }

    /// Temperature in degrees Fahrenheit.
    pub fn value_fahrenheit(&self) -> f64 {
        celsius_to_fahrenheit(self.value_celsius)
    }

    /// Whether the sample carries a usable temperature (no sensor fault).
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fahrenheit() {
        let reading = TemperatureReading::new(Some(1), 100.0, None);
        assert!((reading.value_fahrenheit() - 212.0).abs() < 0.001);
    }

    #[test]
    fn test_validity() {
        assert!(TemperatureReading::new(None, 25.0, None).is_valid());
        assert!(!TemperatureReading::new(None, 25.0, Some(SensorError::OverRange)).is_valid());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(SensorError::Disconnected.to_string(), "sensor disconnected");
        assert_eq!(SensorError::OverRange.to_string(), "over range");
        assert_eq!(SensorError::UnderRange.to_string(), "under range");
    }
}
