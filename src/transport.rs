//! Collaborator seams for the radio link and passcode storage.
//!
//! The scan/connect/service-discovery bootstrap is outside this crate; the
//! engine is handed a live, notifying channel as a [`ByteSink`] plus
//! notification chunks pushed into
//! [`PyrometerSession::on_notification`](crate::session::PyrometerSession::on_notification).

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::Result;

/// Fire-and-forget byte writer for the radio link.
///
/// Writes carry no synchronous delivery confirmation; acknowledgement is
/// inferred only from a subsequent response frame.
#[async_trait]
pub trait ByteSink: Send + Sync {
    /// Write raw bytes to the device.
    async fn write(&self, data: &[u8]) -> Result<()>;
}

/// Lookup of registration passcodes by device identity.
///
/// Owned by an external collaborator; it is the only state that survives
/// across connections.
pub trait PasscodeStore: Send + Sync {
    /// The 8-digit code for a device identity, if one is known.
    fn code_for(&self, identity: &str) -> Option<String>;
}

/// Simple in-memory passcode store.
#[derive(Debug, Default)]
pub struct MemoryPasscodeStore {
    codes: RwLock<HashMap<String, String>>,
}

impl MemoryPasscodeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a code for a device identity.
    pub fn insert(&self, identity: impl Into<String>, code: impl Into<String>) {
        self.codes.write().insert(identity.into(), code.into());
    }
}

impl PasscodeStore for MemoryPasscodeStore {
    fn code_for(&self, identity: &str) -> Option<String> {
        self.codes.read().get(identity).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryPasscodeStore::new();
        assert_eq!(store.code_for("AA:BB"), None);
        store.insert("AA:BB", "74976167");
        assert_eq!(store.code_for("AA:BB"), Some("74976167".to_string()));
    }
}
