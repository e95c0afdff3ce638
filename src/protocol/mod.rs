//! Protocol module for framing, parsing and constructing messages.
//!
//! This module contains the implementations for:
//! - Frame encoding and decoding
//! - Fragment reassembly
//! - Temperature packet parsing (binary and legacy ASCII dialects)
//! - Response status interpretation
//! - Passcode encoding
//! - CRC calculation

pub mod assembler;
pub mod crc;
pub mod frame;
pub mod packet;
pub mod passcode;
pub mod status;

pub use assembler::FrameAssembler;
pub use crc::calculate_crc;
pub use frame::{Command, Frame};
pub use packet::parse_packet;
pub use passcode::encode_passcode;
pub use status::Status;
