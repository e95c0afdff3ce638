//! Error types for the pyrometer-ble crate.
//!
//! The engine surfaces very few typed errors: framing-level problems
//! (short buffers, checksum mismatches, unknown command bytes) are
//! recovered locally, and protocol refusals reach callers as
//! [`SessionEvent`](crate::session::SessionEvent)s rather than errors.
//! What remains is validation before transmission and transport write
//! failures.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// A passcode string failed validation before transmission.
    #[error("Invalid passcode: {context}")]
    InvalidPasscode {
        /// Description of what was invalid.
        context: String,
    },

    /// The write sink reported a failure.
    #[error("Transport write failed: {context}")]
    WriteFailed {
        /// Description of the transport failure.
        context: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = Error::InvalidPasscode {
            context: "expected 8 decimal digits".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid passcode: expected 8 decimal digits");

        let err = Error::WriteFailed {
            context: "characteristic gone".to_string(),
        };
        assert_eq!(err.to_string(), "Transport write failed: characteristic gone");
    }
}
