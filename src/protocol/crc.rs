//! CRC calculation for pyrometer frames.
//!
//! Uses the CRC-16 polynomial 0x1021, MSB-first, initial value 0x0000
//! (CRC-16/XMODEM). The checksum covers every byte from the start-of-frame
//! marker through the end of the payload and travels big-endian on the wire.

/// CRC-16 polynomial.
const CRC_POLYNOMIAL: u16 = 0x1021;

/// Initial CRC value.
const CRC_INITIAL: u16 = 0x0000;

/// Calculate the CRC-16 for frame data.
///
/// # Arguments
///
/// * `data` - The data bytes to calculate CRC for
///
/// # Returns
///
/// The 16-bit CRC value
///
/// # Example
///
/// ```
/// use pyrometer_ble::protocol::calculate_crc;
///
/// let data = [0x01, 0x76, 0x00, 0x04, 0x00, 0x78, 0x56, 0x34, 0x12];
/// assert_eq!(calculate_crc(&data), 0x0DBF);
/// ```
pub fn calculate_crc(data: &[u8]) -> u16 {
    let mut crc = CRC_INITIAL;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ CRC_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Verify that data with appended CRC is valid.
///
/// The last two bytes of the data are treated as the CRC (big-endian).
pub fn verify_crc(data: &[u8]) -> bool {
    if data.len() < 3 {
        return false;
    }

    let payload_len = data.len() - 2;
    let expected_crc = calculate_crc(&data[..payload_len]);
    let actual_crc = u16::from_be_bytes([data[payload_len], data[payload_len + 1]]);

    expected_crc == actual_crc
}

/// Append CRC to a data buffer.
///
/// Calculates the CRC for the provided data and appends it as two bytes in
/// big-endian format.
pub fn append_crc(data: &[u8]) -> Vec<u8> {
    let crc = calculate_crc(data);
    let mut result = data.to_vec();
    result.extend_from_slice(&crc.to_be_bytes());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_empty() {
        let crc = calculate_crc(&[]);
        assert_eq!(crc, CRC_INITIAL);
    }

    #[test]
    fn test_crc_known_vectors() {
        // Fixed vectors captured from the device documentation.
        let data = [0x01, 0x76, 0x00, 0x04, 0x00, 0x78, 0x56, 0x34, 0x12];
        assert_eq!(calculate_crc(&data), 0x0DBF);

        let data = [0x01, 0x33, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(calculate_crc(&data), 0x632B);
    }

    #[test]
    fn test_crc_different_data() {
        let data1 = [0x01, 0x02, 0x03];
        let data2 = [0x01, 0x02, 0x04];
        assert_ne!(calculate_crc(&data1), calculate_crc(&data2));
    }

    #[test]
    fn test_verify_crc_valid() {
        let data = [0x01, 0x76, 0x00];
        let with_crc = append_crc(&data);
        assert!(verify_crc(&with_crc));
    }

    #[test]
    fn test_verify_crc_invalid() {
        let data = [0x01, 0x76, 0x00, 0x00, 0x00]; // Wrong CRC
        assert!(!verify_crc(&data));
    }

    #[test]
    fn test_verify_crc_too_short() {
        let data = [0x01, 0x76];
        assert!(!verify_crc(&data));
    }

    #[test]
    fn test_append_crc() {
        let data = [0x01, 0x76, 0x00];
        let with_crc = append_crc(&data);
        assert_eq!(with_crc.len(), data.len() + 2);
        assert!(verify_crc(&with_crc));
    }
}
