//! Passcode encoding for security-locked devices.

use crate::error::{Error, Result};

/// Encode an 8-digit registration code into the 4-byte passcode payload.
///
/// Each adjacent pair of digits becomes one byte holding the two-digit
/// decimal number in packed BCD, so `"74976167"` encodes to
/// `[0x74, 0x97, 0x61, 0x67]`. Anything other than exactly 8 ASCII digits
/// is rejected before any bytes are produced; codes are never truncated or
/// padded.
pub fn encode_passcode(code: &str) -> Result<[u8; 4]> {
    if code.len() != 8 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPasscode {
            context: format!("expected 8 decimal digits, got {:?}", code),
        });
    }

    let digits: Vec<u8> = code.bytes().map(|b| b - b'0').collect();
    let mut out = [0u8; 4];
    for (i, pair) in digits.chunks_exact(2).enumerate() {
        out[i] = (pair[0] << 4) | pair[1];
    }
    Ok(out)
}
