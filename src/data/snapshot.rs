//! Last-known device configuration.

/// On-device recording mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordingMode {
    /// Sample continuously at the configured interval.
    Continuous,
    /// Sample only while the capture trigger is held.
    Triggered,
    /// Mode byte outside the documented set.
    Unknown(u8),
}

impl RecordingMode {
    /// Interpret a raw mode byte.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x00 => Self::Continuous,
            0x01 => Self::Triggered,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw mode byte.
    pub fn to_raw(&self) -> u8 {
        match self {
            Self::Continuous => 0x00,
            Self::Triggered => 0x01,
            Self::Unknown(raw) => *raw,
        }
    }
}

/// Aggregated last-known device configuration.
///
/// All fields are optional: the snapshot starts empty at session start and
/// fills in as settings responses arrive. Only the session mutates it; UI
/// collaborators read it through the snapshot stream. It is discarded when
/// the link disconnects.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceSnapshot {
    /// Recording interval in seconds.
    pub interval_secs: Option<u16>,
    /// Recording mode.
    pub mode: Option<RecordingMode>,
    /// Whether on-device recording is running.
    pub is_recording: Option<bool>,
    /// Whether the security lock is enabled.
    pub security_on: Option<bool>,
    /// Last device-reported error, human readable.
    pub last_error: Option<String>,
}

impl DeviceSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any field has been learned yet.
    pub fn is_empty(&self) -> bool {
        self.interval_secs.is_none()
            && self.mode.is_none()
            && self.is_recording.is_none()
            && self.security_on.is_none()
            && self.last_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        assert_eq!(RecordingMode::from_raw(0x00), RecordingMode::Continuous);
        assert_eq!(RecordingMode::from_raw(0x01), RecordingMode::Triggered);
        assert_eq!(RecordingMode::from_raw(0x07), RecordingMode::Unknown(0x07));
        assert_eq!(RecordingMode::Unknown(0x07).to_raw(), 0x07);
    }

    #[test]
    fn test_snapshot_starts_empty() {
        let snapshot = DeviceSnapshot::new();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn test_snapshot_partial_update() {
        let mut snapshot = DeviceSnapshot::new();
        snapshot.is_recording = Some(true);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.interval_secs, None);
    }
}
