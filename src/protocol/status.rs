//! Response status interpretation.
//!
//! The first payload byte of a response frame reports whether the device
//! honored the request.

/// Refusal reason reported when the device is security-locked and the
/// current-value command is not yet unlocked.
pub const REFUSE_SECURITY_LOCKED: u8 = 0x04;

/// Outcome of a command as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    /// Command accepted (0x00).
    Ack,
    /// Device busy, retry later (0x01).
    Busy,
    /// Command refused with a device-specific reason code.
    Refuse(u8),
    /// Byte outside the documented status space.
    Unknown(u8),
}

impl Status {
    /// Interpret a raw status byte.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x00 => Self::Ack,
            0x01 => Self::Busy,
            0x02..=0x7F => Self::Refuse(value),
            other => Self::Unknown(other),
        }
    }

    /// Derive the status from a response frame payload.
    ///
    /// An empty payload is treated as an acknowledgement; some firmware
    /// revisions answer start/stop with a bare frame.
    pub fn from_payload(payload: &[u8]) -> Self {
        match payload.first() {
            Some(&byte) => Self::from_raw(byte),
            None => Self::Ack,
        }
    }

    /// Whether the round-trip succeeded.
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }

    /// Whether this is the security-locked refusal.
    pub fn is_security_locked(&self) -> bool {
        matches!(self, Self::Refuse(REFUSE_SECURITY_LOCKED))
    }

    /// Human-readable refusal description for surfacing to callers.
    pub fn describe(&self) -> String {
        match self {
            Self::Ack => "acknowledged".to_string(),
            Self::Busy => "device busy".to_string(),
            Self::Refuse(REFUSE_SECURITY_LOCKED) => "security locked".to_string(),
            Self::Refuse(reason) => format!("refused (reason {reason:#04x})"),
            Self::Unknown(raw) => format!("unknown status {raw:#04x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw() {
        assert_eq!(Status::from_raw(0x00), Status::Ack);
        assert_eq!(Status::from_raw(0x01), Status::Busy);
        assert_eq!(Status::from_raw(0x04), Status::Refuse(0x04));
        assert_eq!(Status::from_raw(0x7F), Status::Refuse(0x7F));
        assert_eq!(Status::from_raw(0xC3), Status::Unknown(0xC3));
    }

    #[test]
    fn test_from_payload() {
        assert_eq!(Status::from_payload(&[0x00, 0xAA]), Status::Ack);
        assert_eq!(Status::from_payload(&[0x04]), Status::Refuse(0x04));
        assert_eq!(Status::from_payload(&[]), Status::Ack);
    }

    #[test]
    fn test_security_locked() {
        assert!(Status::from_raw(REFUSE_SECURITY_LOCKED).is_security_locked());
        assert!(!Status::Refuse(0x05).is_security_locked());
        assert!(!Status::Ack.is_security_locked());
    }

    #[test]
    fn test_describe() {
        assert_eq!(Status::Refuse(0x04).describe(), "security locked");
        assert_eq!(Status::Refuse(0x09).describe(), "refused (reason 0x09)");
    }
}
