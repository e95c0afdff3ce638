//! Reassembly of notification fragments into frames.
//!
//! BLE notifications carry arbitrary-length chunks with no framing
//! guarantee: one logical frame may arrive split across several
//! notifications, or several frames may share one. The assembler
//! accumulates chunks and extracts every complete, checksum-valid frame,
//! resynchronizing after noise by dropping exactly one leading byte at a
//! time.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::protocol::frame::{self, Frame, MIN_FRAME_SIZE, START_OF_FRAME};
use crate::utils::hex_string;

/// Stateful byte-buffer accumulator for inbound frames.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: BytesMut,
}

impl FrameAssembler {
    /// Create an empty assembler.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
        }
    }

    /// Append a notification chunk and extract complete frames.
    ///
    /// Returns every frame completed by this chunk, in arrival order.
    /// Partial trailing data stays buffered for the next call.
    pub fn append(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        loop {
            if self.buffer.len() < MIN_FRAME_SIZE {
                break;
            }

            // Resynchronize: skip one leading byte at a time until the
            // buffer starts at a frame marker. Dropping exactly one byte
            // never loses a frame start hidden inside a corrupted span.
            if self.buffer[0] != START_OF_FRAME {
                self.buffer.advance(1);
                continue;
            }

            let total = match frame::declared_total_size(&self.buffer) {
                Some(total) => total,
                None => break,
            };
            if self.buffer.len() < total {
                // Wait for the rest of the declared frame.
                break;
            }

            match frame::decode(&self.buffer[..total]) {
                Some(frame) => {
                    trace!("assembled frame: {}", hex_string(&self.buffer[..total]));
                    self.buffer.advance(total);
                    frames.push(frame);
                }
                None => {
                    // Checksum mismatch: the marker byte was noise or the
                    // frame was torn. Drop one byte and rescan.
                    debug!(
                        "checksum mismatch, resyncing: {}",
                        hex_string(&self.buffer[..total.min(16)])
                    );
                    self.buffer.advance(1);
                }
            }
        }

        frames
    }

    /// Number of bytes currently buffered.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer. Called on disconnect so a reconnect starts clean.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::frame::{encode, Command};

    fn frame_bytes(cmd: Command, seq: u8, payload: &[u8]) -> Vec<u8> {
        encode(cmd, seq, payload, false)
    }

    #[test]
    fn test_single_frame() {
        let mut assembler = FrameAssembler::new();
        let bytes = frame_bytes(Command::CurrentValue, 1, &[0x00, 0x42]);
        let frames = assembler.append(&bytes);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, Command::CurrentValue);
        assert_eq!(frames[0].payload, vec![0x00, 0x42]);
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_two_frames_one_chunk() {
        let mut assembler = FrameAssembler::new();
        let mut chunk = frame_bytes(Command::ReadSettings, 1, &[]);
        chunk.extend(frame_bytes(Command::CurrentValue, 2, &[0x00]));
        let frames = assembler.append(&chunk);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command, Command::ReadSettings);
        assert_eq!(frames[1].command, Command::CurrentValue);
    }

    #[test]
    fn test_fragmented_frame() {
        let mut assembler = FrameAssembler::new();
        let bytes = frame_bytes(Command::CurrentValue, 5, &[1, 2, 3, 4, 5]);

        // Feed in three pieces; only the final piece completes the frame.
        let frames = assembler.append(&bytes[..3]);
        assert!(frames.is_empty());
        let frames = assembler.append(&bytes[3..8]);
        assert!(frames.is_empty());
        let frames = assembler.append(&bytes[8..]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_fragmented_every_split_point() {
        let bytes = frame_bytes(Command::WriteSettings, 9, &[9, 8, 7]);
        for split in 1..bytes.len() {
            let mut assembler = FrameAssembler::new();
            assert!(assembler.append(&bytes[..split]).is_empty());
            let frames = assembler.append(&bytes[split..]);
            assert_eq!(frames.len(), 1, "split at {split}");
        }
    }

    #[test]
    fn test_noise_between_frames() {
        let mut assembler = FrameAssembler::new();
        let mut chunk = frame_bytes(Command::CurrentValue, 1, &[0x10]);
        chunk.push(0xEE); // one byte of line noise
        chunk.extend(frame_bytes(Command::CurrentValue, 2, &[0x20]));

        let frames = assembler.append(&chunk);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].sequence, 1);
        assert_eq!(frames[1].sequence, 2);
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_leading_noise_discarded() {
        let mut assembler = FrameAssembler::new();
        let mut chunk = vec![0x00, 0xFF, 0x42];
        chunk.extend(frame_bytes(Command::ReadSettings, 3, &[]));
        let frames = assembler.append(&chunk);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command, Command::ReadSettings);
    }

    #[test]
    fn test_corrupted_byte_recovery() {
        // A corrupted frame followed by a valid one in the same chunk: the
        // assembler drops single bytes through the corrupted span and still
        // finds the valid frame behind it.
        let mut assembler = FrameAssembler::new();
        let mut corrupt = frame_bytes(Command::CurrentValue, 9, &[0xAA; 8]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0xFF; // break the CRC
        let good = frame_bytes(Command::CurrentValue, 2, &[0xBB]);

        let mut chunk = corrupt;
        chunk.extend(&good);
        let frames = assembler.append(&chunk);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 2);
        assert_eq!(assembler.buffered_len(), 0);
    }

    #[test]
    fn test_reset_clears_partial() {
        let mut assembler = FrameAssembler::new();
        let bytes = frame_bytes(Command::CurrentValue, 1, &[1, 2, 3]);
        assembler.append(&bytes[..6]);
        assert!(assembler.buffered_len() > 0);
        assembler.reset();
        assert_eq!(assembler.buffered_len(), 0);

        // Leftover prefix must not poison the next connection.
        let frames = assembler.append(&bytes);
        assert_eq!(frames.len(), 1);
    }
}
