//! # pyrometer-ble
//!
//! Wire-protocol engine for handheld Bluetooth tyre pyrometers, the
//! thermometers used to log tyre-surface temperatures during track
//! sessions.
//!
//! The crate turns a noisy, fragment-prone BLE notification channel into a
//! reliable stream of temperature readings and configuration round-trips.
//! It does not scan, connect or discover services: the radio bootstrap is
//! the caller's job, and the engine is handed a live notifying channel
//! plus a way to write bytes.
//!
//! ## Layers
//!
//! - [`protocol`]: frame encoding/decoding with CRC-16, fragment
//!   reassembly, temperature packet parsing (binary and legacy ASCII
//!   dialects), status interpretation, passcode encoding
//! - [`polling`]: adaptive decision between active polling and letting the
//!   device stream
//! - [`session`]: the per-device command/response engine tying it together
//! - [`transport`]: the seams a radio stack plugs into
//!
//! Each layer is consumable on its own; the session composes them.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pyrometer_ble::{MemoryPasscodeStore, PyrometerSession, SessionConfig};
//!
//! # async fn run(sink: Arc<dyn pyrometer_ble::ByteSink>) {
//! let passcodes = Arc::new(MemoryPasscodeStore::new());
//! passcodes.insert("DC:23:4F:61", "74976167");
//!
//! let session = PyrometerSession::new(SessionConfig::new("DC:23:4F:61"), passcodes);
//! let mut readings = session.subscribe_readings();
//!
//! // Radio stack wiring: hand over the write channel and forward
//! // notification chunks.
//! session.attach_sink(sink);
//! session.mark_ready();
//! // session.on_notification(&chunk) from the notify callback...
//!
//! while let Ok(reading) = readings.recv().await {
//!     println!("{:?}: {:.1} °C", reading.channel, reading.value_celsius);
//! }
//! # }
//! ```
//!
//! ## Concurrency model
//!
//! The engine expects the radio stack's serialized-callback model: one
//! notification chunk at a time into
//! [`PyrometerSession::on_notification`], writes fire-and-forget. Internal
//! state is owned by the session and never exposed mutably; consumers get
//! push streams (`tokio::sync::broadcast`) for readings, snapshot updates,
//! session events and the wire log.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types

// Public modules
pub mod data;
pub mod error;
pub mod polling;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};
pub use session::{PyrometerSession, SessionConfig, SessionEvent, SessionState};
pub use transport::{ByteSink, MemoryPasscodeStore, PasscodeStore};
pub use utils::{celsius_to_fahrenheit, fahrenheit_to_celsius};

// Re-export commonly used types from submodules
pub use data::{DeviceSnapshot, RecordingMode, SensorError, TemperatureReading};
pub use polling::{PollDecision, PollingController, PollingMetrics};
pub use protocol::{Command, Frame, FrameAssembler, Status};
