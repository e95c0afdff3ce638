//! Temperature packet parsing.
//!
//! The pyrometer hardware exists in two generations with incompatible
//! payload encodings:
//!
//! 1. A binary status-coded format framed like the command/response
//!    protocol, carrying a signed raw value.
//! 2. A legacy unframed ASCII digit stream, e.g. `001+00243` (channel 1,
//!    24.3 °C), with literal markers for sensor faults.
//!
//! [`parse_packet`] tries the binary dialect first and falls back to ASCII.
//! It depends on raw bytes only; neither dialect needs any session state.

use tracing::trace;

use crate::data::{SensorError, TemperatureReading};
use crate::protocol::frame::START_OF_FRAME;

/// Command code marking a binary current-value packet.
const CURRENT_VALUE_CODE: u8 = 0x76;

/// Sub-status values the binary dialect accepts as success. The hardware
/// emits both without documented distinction; both are treated identically.
const BINARY_SUBSTATUS_OK: [u8; 2] = [0x00, 0x80];

/// Minimum total size of a binary current-value packet.
const BINARY_MIN_SIZE: usize = 11;

/// Minimum number of printable bytes for the ASCII dialect.
const ASCII_MIN_SIZE: usize = 8;

/// Literal marker for a disconnected (open / burnt-out) sensor.
const MARKER_SENSOR_OPEN: &str = "B-OUT";
/// Literal marker for an over-range reading.
const MARKER_OVER_RANGE: &str = "O-R";
/// Literal marker for an under-range reading.
const MARKER_UNDER_RANGE: &str = "U-R";

/// Parse a raw buffer into a temperature reading, trying the binary dialect
/// first and the legacy ASCII dialect second.
///
/// Returns `None` when neither dialect yields a reading; this is "nothing
/// parseable yet", not an error.
pub fn parse_packet(data: &[u8]) -> Option<TemperatureReading> {
    parse_binary(data).or_else(|| parse_ascii(data))
}

/// Parse the binary status-coded dialect.
///
/// Layout: `[0x01][0x76][substatus][LEN_LO][LEN_HI][PAYLOAD...]` with the
/// first two payload bytes carrying a little-endian signed raw value scaled
/// as `(raw - 1000) / 10` degrees Celsius. This device family reports a
/// single channel.
pub fn parse_binary(data: &[u8]) -> Option<TemperatureReading> {
    if data.len() < BINARY_MIN_SIZE {
        return None;
    }
    if data[0] != START_OF_FRAME || data[1] != CURRENT_VALUE_CODE {
        return None;
    }
    if !BINARY_SUBSTATUS_OK.contains(&data[2]) {
        return None;
    }

    let length = u16::from_le_bytes([data[3], data[4]]) as usize;
    if length < 2 || data.len() < 5 + length + 2 {
        return None;
    }

    let raw = i16::from_le_bytes([data[5], data[6]]);
    let celsius = f64::from(i32::from(raw) - 1000) / 10.0;
    trace!("binary packet: raw={raw} -> {celsius:.1}C");

    Some(TemperatureReading::new(Some(1), celsius, None))
}

/// Parse the legacy ASCII digit-stream dialect.
///
/// Non-printable bytes are discarded first; the survivors must hold a sign
/// character with at least two digits of magnitude behind it, e.g.
/// `001+00243` for channel 1 at 24.3 °C. Up to three digits immediately
/// before the sign name the channel. Fault markers (`B-OUT`, `O-R`, `U-R`)
/// are detected anywhere in the printable text.
pub fn parse_ascii(data: &[u8]) -> Option<TemperatureReading> {
    // Keep printable ASCII only; the legacy sensor interleaves control
    // bytes freely.
    let printable: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| (0x20..=0x7E).contains(b))
        .collect();
    if printable.len() < ASCII_MIN_SIZE {
        return None;
    }
    let text = String::from_utf8_lossy(&printable).into_owned();

    let sign_pos = text.find(|c| c == '+' || c == '-')?;
    let bytes = text.as_bytes();
    let negative = bytes[sign_pos] == b'-';

    // Up to 3 digits immediately preceding the sign form the channel id.
    // The scan stops at three digits or the start of the text, whichever
    // comes first, even if earlier fields end in numerals.
    let mut chan_start = sign_pos;
    while chan_start > 0 && sign_pos - chan_start < 3 && bytes[chan_start - 1].is_ascii_digit() {
        chan_start -= 1;
    }
    let channel = if chan_start < sign_pos {
        text[chan_start..sign_pos].parse::<u16>().ok()
    } else {
        None
    };

    // Up to 6 digits after the sign form the magnitude, in tenths.
    let mut mag_end = sign_pos + 1;
    while mag_end < bytes.len() && mag_end - sign_pos <= 6 && bytes[mag_end].is_ascii_digit() {
        mag_end += 1;
    }
    let digits = mag_end - (sign_pos + 1);
    if digits < 2 {
        return None;
    }
    let magnitude: i64 = text[sign_pos + 1..mag_end].parse().ok()?;

    let sign = if negative { -1.0 } else { 1.0 };
    let celsius = sign * (magnitude as f64 / 10.0);

    let error = if text.contains(MARKER_SENSOR_OPEN) {
        Some(SensorError::Disconnected)
    } else if text.contains(MARKER_OVER_RANGE) {
        Some(SensorError::OverRange)
    } else if text.contains(MARKER_UNDER_RANGE) {
        Some(SensorError::UnderRange)
    } else {
        None
    };

    trace!("ascii packet: {text:?} -> ch={channel:?} {celsius:.1}C err={error:?}");

    Some(TemperatureReading::new(channel, celsius, error))
}
