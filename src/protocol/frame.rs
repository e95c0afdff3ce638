//! Frame types, encoding and decoding.
//!
//! Defines the framed message format used on the pyrometer's serial-over-BLE
//! channel.
//!
//! Wire format:
//! `[0x01][CMD:1][SEQ:1][LEN_LO:1][LEN_HI:1][PAYLOAD:LEN][CRC_HI:1][CRC_LO:1]`
//!
//! The CRC covers bytes 0 through the end of the payload and is appended
//! big-endian. The payload length is a little-endian u16. Some device
//! families require a single 0x00 break byte before a frame to wake the
//! receiver; the encoder can prefix one on request.

use crate::protocol::crc::calculate_crc;

/// Start-of-frame marker (SOH).
pub const START_OF_FRAME: u8 = 0x01;

/// Break byte some device families need before a frame.
pub const BREAK_BYTE: u8 = 0x00;

/// Fixed header size: marker + command + sequence + length (2).
pub const HEADER_SIZE: usize = 5;

/// Trailing CRC size.
pub const CRC_SIZE: usize = 2;

/// Smallest possible frame: header plus CRC, empty payload.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CRC_SIZE;

/// Command codes understood by the pyrometer.
///
/// The transport is strict command/response: the device answers a request
/// with a frame carrying the same command code, so every request expects a
/// response of its own command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Request / report the current temperature reading (0x76).
    CurrentValue,
    /// Read the recording settings snapshot (0x33).
    ReadSettings,
    /// Write recording settings (0x34).
    WriteSettings,
    /// Start on-device recording (0x35).
    StartRecording,
    /// Stop on-device recording (0x36).
    StopRecording,
    /// Submit the security passcode (0x41).
    Passcode,
    /// Command byte not in the known set; carried for logging.
    Unknown(u8),
}

impl Command {
    /// Create from a raw command byte.
    pub fn from_raw(value: u8) -> Self {
        match value {
            0x76 => Self::CurrentValue,
            0x33 => Self::ReadSettings,
            0x34 => Self::WriteSettings,
            0x35 => Self::StartRecording,
            0x36 => Self::StopRecording,
            0x41 => Self::Passcode,
            other => Self::Unknown(other),
        }
    }

    /// Convert to the raw command byte.
    pub fn to_raw(&self) -> u8 {
        match self {
            Self::CurrentValue => 0x76,
            Self::ReadSettings => 0x33,
            Self::WriteSettings => 0x34,
            Self::StartRecording => 0x35,
            Self::StopRecording => 0x36,
            Self::Passcode => 0x41,
            Self::Unknown(raw) => *raw,
        }
    }

    /// The command code expected on the response to this request.
    ///
    /// The device echoes the request's command code, so this is the identity
    /// mapping; it exists to make the pairing explicit at call sites.
    pub fn response_command(&self) -> Self {
        *self
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CurrentValue => write!(f, "CurrentValue"),
            Self::ReadSettings => write!(f, "ReadSettings"),
            Self::WriteSettings => write!(f, "WriteSettings"),
            Self::StartRecording => write!(f, "StartRecording"),
            Self::StopRecording => write!(f, "StopRecording"),
            Self::Passcode => write!(f, "Passcode"),
            Self::Unknown(raw) => write!(f, "Unknown({raw:#04x})"),
        }
    }
}

/// One complete, checksum-valid protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code.
    pub command: Command,
    /// 8-bit sequence counter value (advisory; wraps).
    pub sequence: u8,
    /// Frame payload.
    pub payload: Vec<u8>,
    /// CRC as transmitted.
    pub checksum: u16,
}

impl Frame {
    /// Build a frame from its parts, computing the checksum.
    pub fn new(command: Command, sequence: u8, payload: Vec<u8>) -> Self {
        let checksum = calculate_crc(&frame_body(command, sequence, &payload));
        Self {
            command,
            sequence,
            payload,
            checksum,
        }
    }

    /// Serialize the frame to wire bytes, without a break prefix.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self.command, self.sequence, &self.payload, false)
    }
}

fn frame_body(command: Command, sequence: u8, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(HEADER_SIZE + payload.len());
    body.push(START_OF_FRAME);
    body.push(command.to_raw());
    body.push(sequence);
    let len = payload.len() as u16;
    body.extend_from_slice(&len.to_le_bytes());
    body.extend_from_slice(payload);
    body
}

/// Encode a frame to wire bytes.
///
/// # Arguments
///
/// * `command` - Command code for the frame
/// * `sequence` - Sequence counter value
/// * `payload` - Payload bytes
/// * `with_break` - Prefix the 0x00 break byte required by some device
///   families to wake the receiver
pub fn encode(command: Command, sequence: u8, payload: &[u8], with_break: bool) -> Vec<u8> {
    let body = frame_body(command, sequence, payload);
    let crc = calculate_crc(&body);

    let mut data = Vec::with_capacity(body.len() + CRC_SIZE + usize::from(with_break));
    if with_break {
        data.push(BREAK_BYTE);
    }
    data.extend_from_slice(&body);
    data.extend_from_slice(&crc.to_be_bytes());
    data
}

/// Decode wire bytes into a [`Frame`].
///
/// Returns `None` on any shortfall or mismatch: buffer shorter than the
/// minimal frame, missing start marker, declared payload not fully present,
/// or CRC mismatch. Callers treat `None` as "not yet a complete frame"
/// rather than a protocol violation, so this never returns an error.
pub fn decode(data: &[u8]) -> Option<Frame> {
    if data.len() < MIN_FRAME_SIZE {
        return None;
    }
    if data[0] != START_OF_FRAME {
        return None;
    }

    let length = u16::from_le_bytes([data[3], data[4]]) as usize;
    let total = HEADER_SIZE + length + CRC_SIZE;
    if data.len() < total {
        return None;
    }

    let crc_input = &data[..total - CRC_SIZE];
    let expected = calculate_crc(crc_input);
    let actual = u16::from_be_bytes([data[total - CRC_SIZE], data[total - 1]]);
    if expected != actual {
        return None;
    }

    Some(Frame {
        command: Command::from_raw(data[1]),
        sequence: data[2],
        payload: data[HEADER_SIZE..HEADER_SIZE + length].to_vec(),
        checksum: actual,
    })
}

/// Total wire size of the frame starting at the head of `data`, if the
/// declared length can be read yet.
///
/// Does not validate the CRC; used by the assembler to decide how many
/// bytes to wait for.
pub fn declared_total_size(data: &[u8]) -> Option<usize> {
    if data.len() < HEADER_SIZE {
        return None;
    }
    let length = u16::from_le_bytes([data[3], data[4]]) as usize;
    Some(HEADER_SIZE + length + CRC_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_command_round_trip() {
        for raw in [0x76, 0x33, 0x34, 0x35, 0x36, 0x41] {
            assert_eq!(Command::from_raw(raw).to_raw(), raw);
        }
        assert_eq!(Command::from_raw(0x99), Command::Unknown(0x99));
        assert_eq!(Command::Unknown(0x99).to_raw(), 0x99);
    }

    #[test]
    fn test_response_command_is_echo() {
        assert_eq!(
            Command::CurrentValue.response_command(),
            Command::CurrentValue
        );
        assert_eq!(
            Command::ReadSettings.response_command(),
            Command::ReadSettings
        );
    }

    #[test]
    fn test_encode_layout() {
        let bytes = encode(Command::CurrentValue, 7, &[0xAA, 0xBB], false);
        assert_eq!(bytes[0], START_OF_FRAME);
        assert_eq!(bytes[1], 0x76);
        assert_eq!(bytes[2], 7);
        assert_eq!(bytes[3], 2); // LEN_LO
        assert_eq!(bytes[4], 0); // LEN_HI
        assert_eq!(&bytes[5..7], &[0xAA, 0xBB]);
        assert_eq!(bytes.len(), MIN_FRAME_SIZE + 2);

        let crc = calculate_crc(&bytes[..7]);
        assert_eq!(u16::from_be_bytes([bytes[7], bytes[8]]), crc);
    }

    #[test]
    fn test_encode_with_break() {
        let bytes = encode(Command::ReadSettings, 0, &[], true);
        assert_eq!(bytes[0], BREAK_BYTE);
        assert_eq!(bytes[1], START_OF_FRAME);
        // The break byte is outside the CRC input.
        assert!(decode(&bytes[1..]).is_some());
    }

    #[test]
    fn test_decode_empty_payload() {
        let bytes = encode(Command::StartRecording, 3, &[], false);
        let frame = decode(&bytes).unwrap();
        assert_eq!(frame.command, Command::StartRecording);
        assert_eq!(frame.sequence, 3);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_decode_too_short() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[START_OF_FRAME, 0x76, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_decode_bad_marker() {
        let mut bytes = encode(Command::CurrentValue, 0, &[1, 2], false);
        bytes[0] = 0x55;
        assert!(decode(&bytes).is_none());
    }

    #[test]
    fn test_decode_truncated_payload() {
        let bytes = encode(Command::CurrentValue, 0, &[1, 2, 3, 4], false);
        assert!(decode(&bytes[..bytes.len() - 1]).is_none());
    }

    #[test]
    fn test_decode_corrupt_payload() {
        let mut bytes = encode(Command::CurrentValue, 0, &[1, 2, 3, 4], false);
        bytes[6] ^= 0x01;
        assert!(decode(&bytes).is_none());
    }

    #[test]
    fn test_declared_total_size() {
        let bytes = encode(Command::CurrentValue, 0, &[0; 10], false);
        assert_eq!(declared_total_size(&bytes), Some(MIN_FRAME_SIZE + 10));
        assert_eq!(declared_total_size(&bytes[..4]), None);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            cmd in prop::sample::select(vec![0x76u8, 0x33, 0x34, 0x35, 0x36, 0x41, 0x99]),
            seq in any::<u8>(),
            payload in prop::collection::vec(any::<u8>(), 0..=64),
        ) {
            let command = Command::from_raw(cmd);
            let bytes = encode(command, seq, &payload, false);
            let frame = decode(&bytes).unwrap();
            prop_assert_eq!(frame.command, command);
            prop_assert_eq!(frame.sequence, seq);
            prop_assert_eq!(frame.payload, payload);
        }
    }
}
