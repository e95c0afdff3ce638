//! Command/response session for a connected pyrometer.
//!
//! [`PyrometerSession`] owns the sequence counter, the frame assembler and
//! the adaptive polling controller, drives the per-device protocol state
//! machine, and fans decoded data out to collaborators over broadcast
//! channels (readings, snapshot updates, session events, wire log).
//!
//! The engine assumes the serialized-callback model of the radio stack:
//! notification chunks arrive through [`PyrometerSession::on_notification`]
//! one at a time, and writes are fire-and-forget. Acknowledgement is only
//! ever inferred from a response frame.

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::data::{DeviceSnapshot, RecordingMode, TemperatureReading};
use crate::error::Result;
use crate::polling::{PollDecision, PollingController, POLL_INTERVAL, TICK_INTERVAL};
use crate::protocol::frame::{self, Command};
use crate::protocol::passcode::encode_passcode;
use crate::protocol::{parse_packet, Frame, FrameAssembler, Status};
use crate::transport::{ByteSink, PasscodeStore};
use crate::utils::hex_string;

/// Session lifecycle state for a connected device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No link activity yet.
    #[default]
    Idle,
    /// Link up, waiting for the radio stack to finish characteristic setup.
    AwaitingCharacteristics,
    /// Channel live, no polling decision made yet.
    Ready,
    /// Actively requesting readings at the poll rate.
    Polling,
    /// Device is pushing readings on its own; polling suspended.
    Streaming,
    /// Device refused the current-value command pending a passcode.
    SecurityLocked,
    /// Link is down. Reachable from any state.
    Disconnected,
}

impl SessionState {
    /// Whether the session can exchange frames.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Idle | Self::Disconnected)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::AwaitingCharacteristics => write!(f, "AwaitingCharacteristics"),
            Self::Ready => write!(f, "Ready"),
            Self::Polling => write!(f, "Polling"),
            Self::Streaming => write!(f, "Streaming"),
            Self::SecurityLocked => write!(f, "SecurityLocked"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// Out-of-band signals surfaced to collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The device is security locked and wants a passcode.
    SecurityNeeded,
    /// A passcode was accepted; the link is unlocked.
    Unlocked,
    /// The device rejected the submitted passcode. Not retried.
    PasscodeRejected,
    /// The device refused a command.
    Refused {
        /// The refused command.
        command: Command,
        /// Device-reported reason, human readable.
        reason: String,
    },
    /// The session state machine moved.
    StateChanged(SessionState),
}

/// Session construction options.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stable identity of the device (e.g. peripheral address), used as the
    /// passcode lookup key.
    pub device_identity: String,
    /// Prefix every outbound frame with the 0x00 break byte. Required by
    /// some device families to wake the receiver.
    pub wake_prefix: bool,
}

impl SessionConfig {
    /// Config for a device identity with defaults.
    pub fn new(device_identity: impl Into<String>) -> Self {
        Self {
            device_identity: device_identity.into(),
            wake_prefix: false,
        }
    }
}

/// Serialized core state; everything the inbound path mutates lives here.
struct SessionInner {
    state: SessionState,
    sequence: u8,
    assembler: FrameAssembler,
    controller: PollingController,
    snapshot: DeviceSnapshot,
    /// Encoded frames waiting for a write channel.
    pending_writes: Vec<Vec<u8>>,
    /// A passcode frame is in flight; suppresses duplicate auto-unlocks.
    passcode_in_flight: bool,
    /// The device rejected a passcode; no further automatic attempts.
    passcode_rejected: bool,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            sequence: 0,
            assembler: FrameAssembler::new(),
            controller: PollingController::new(),
            snapshot: DeviceSnapshot::new(),
            pending_writes: Vec::new(),
            passcode_in_flight: false,
            passcode_rejected: false,
        }
    }
}

/// State shared between the session handle and its timer tasks.
struct Shared {
    config: SessionConfig,
    inner: Mutex<SessionInner>,
    sink: RwLock<Option<Arc<dyn ByteSink>>>,
    passcodes: Arc<dyn PasscodeStore>,
    reading_tx: broadcast::Sender<TemperatureReading>,
    snapshot_tx: broadcast::Sender<DeviceSnapshot>,
    event_tx: broadcast::Sender<SessionEvent>,
    wire_log_tx: broadcast::Sender<String>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

/// Protocol engine for one connected pyrometer.
///
/// Cheap to clone; clones share the same session. Timer tasks hold only
/// weak references, so dropping the last handle tears the session down.
#[derive(Clone)]
pub struct PyrometerSession {
    shared: Arc<Shared>,
}

impl PyrometerSession {
    /// Create a session for a device.
    pub fn new(config: SessionConfig, passcodes: Arc<dyn PasscodeStore>) -> Self {
        let (reading_tx, _) = broadcast::channel(64);
        let (snapshot_tx, _) = broadcast::channel(16);
        let (event_tx, _) = broadcast::channel(32);
        let (wire_log_tx, _) = broadcast::channel(128);

        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(SessionInner::new()),
                sink: RwLock::new(None),
                passcodes,
                reading_tx,
                snapshot_tx,
                event_tx,
                wire_log_tx,
                tick_task: Mutex::new(None),
                poll_task: Mutex::new(None),
            }),
        }
    }

    /// The device identity this session is bound to.
    pub fn device_identity(&self) -> &str {
        &self.shared.config.device_identity
    }

    /// Current state machine position.
    pub fn state(&self) -> SessionState {
        self.shared.inner.lock().state
    }

    /// Copy of the last-known device configuration.
    pub fn snapshot(&self) -> DeviceSnapshot {
        self.shared.inner.lock().snapshot.clone()
    }

    /// Subscribe to decoded temperature readings.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<TemperatureReading> {
        self.shared.reading_tx.subscribe()
    }

    /// Subscribe to device snapshot updates.
    pub fn subscribe_snapshots(&self) -> broadcast::Receiver<DeviceSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Subscribe to session events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Subscribe to the human-readable wire log (one line per frame sent
    /// or received, hex-encoded; intended for a diagnostics surface).
    pub fn subscribe_wire_log(&self) -> broadcast::Receiver<String> {
        self.shared.wire_log_tx.subscribe()
    }

    // --- lifecycle ---------------------------------------------------

    /// The radio stack connected and is discovering characteristics.
    pub fn begin_discovery(&self) {
        let mut inner = self.shared.inner.lock();
        self.shared
            .set_state(&mut inner, SessionState::AwaitingCharacteristics);
    }

    /// Attach the write channel once the radio stack exposes it.
    ///
    /// Flushes any writes queued while no channel was available, and fires
    /// a deferred polling start if the controller requested one.
    pub fn attach_sink(&self, sink: Arc<dyn ByteSink>) {
        *self.shared.sink.write() = Some(sink);

        let (queued, deferred) = {
            let mut inner = self.shared.inner.lock();
            let queued = std::mem::take(&mut inner.pending_writes);
            let deferred = inner.controller.on_sink_ready();
            (queued, deferred)
        };

        for bytes in queued {
            debug!("flushing deferred write ({} bytes)", bytes.len());
            self.shared.write_bytes(bytes);
        }
        if deferred == Some(PollDecision::StartPolling) {
            start_poll_loop(&self.shared);
        }
    }

    /// Characteristic setup finished; the notification channel is live.
    ///
    /// Starts the 1-second decision ticker and, when a write channel is
    /// attached, active polling.
    pub fn mark_ready(&self) {
        {
            let mut inner = self.shared.inner.lock();
            self.shared.set_state(&mut inner, SessionState::Ready);
        }
        start_ticker(&self.shared);
        if self.shared.sink.read().is_some() {
            start_poll_loop(&self.shared);
        }
    }

    /// Tear the session down on link loss.
    ///
    /// Synchronously stops all timers, clears the assembler and in-flight
    /// expectations, and discards the device snapshot. The passcode store
    /// is externally owned and survives.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    // --- outbound ----------------------------------------------------

    /// Encode and transmit a command frame.
    ///
    /// Writes are fire-and-forget; with no write channel attached the
    /// encoded frame is queued and flushed by [`Self::attach_sink`], never
    /// dropped or failed.
    pub fn send(&self, command: Command, payload: &[u8]) {
        self.shared.send(command, payload);
    }

    /// Request the current temperature reading.
    pub fn request_current_value(&self) {
        self.send(Command::CurrentValue, &[]);
    }

    /// Request the recording-settings snapshot.
    pub fn read_settings(&self) {
        self.send(Command::ReadSettings, &[]);
    }

    /// Write recording interval and mode.
    pub fn write_settings(&self, interval_secs: u16, mode: RecordingMode) {
        let mut payload = interval_secs.to_le_bytes().to_vec();
        payload.push(mode.to_raw());
        self.send(Command::WriteSettings, &payload);
    }

    /// Start on-device recording.
    pub fn start_recording(&self) {
        self.send(Command::StartRecording, &[]);
    }

    /// Stop on-device recording.
    pub fn stop_recording(&self) {
        self.send(Command::StopRecording, &[]);
    }

    /// Validate and submit a passcode.
    ///
    /// Fails fast on anything other than exactly 8 decimal digits; nothing
    /// is transmitted for an invalid code.
    pub fn submit_passcode(&self, code: &str) -> Result<()> {
        let encoded = encode_passcode(code)?;
        {
            let mut inner = self.shared.inner.lock();
            inner.passcode_in_flight = true;
            // An explicit user submission re-arms the automatic unlock.
            inner.passcode_rejected = false;
        }
        self.send(Command::Passcode, &encoded);
        Ok(())
    }

    // --- inbound -----------------------------------------------------

    /// Feed one raw notification chunk from the radio stack.
    ///
    /// Chunks may split or combine logical frames arbitrarily. Completed
    /// frames drive the polling controller and the command dispatch; a
    /// chunk that completes no frame is offered to the packet parser
    /// instead, because the legacy ASCII dialect is not framed at all.
    pub fn on_notification(&self, data: &[u8]) {
        let now = Instant::now();
        let shared = &self.shared;
        let frames = {
            let mut inner = shared.inner.lock();
            if inner.state == SessionState::Disconnected {
                return;
            }
            inner.assembler.append(data)
        };

        if frames.is_empty() {
            if let Some(reading) = parse_packet(data) {
                shared.inner.lock().controller.on_frame(now);
                shared.log_wire(format!("RX stream {}", hex_string(data)));
                trace!(
                    "stream reading: ch={:?} {:.1}C",
                    reading.channel,
                    reading.value_celsius
                );
                let _ = shared.reading_tx.send(reading);
            }
            return;
        }

        for frame in frames {
            shared.inner.lock().controller.on_frame(now);
            dispatch(shared, &frame);
        }
    }
}

impl Shared {
    fn send(&self, command: Command, payload: &[u8]) {
        let bytes = {
            let mut inner = self.inner.lock();
            let sequence = inner.sequence;
            inner.sequence = inner.sequence.wrapping_add(1);
            let bytes = frame::encode(command, sequence, payload, self.config.wake_prefix);
            self.log_wire(format!(
                "TX {} seq={} {}",
                command,
                sequence,
                hex_string(&bytes)
            ));
            trace!("expecting {} response", command.response_command());

            if self.sink.read().is_none() {
                debug!("no write channel, deferring {command}");
                inner.pending_writes.push(bytes);
                return;
            }
            bytes
        };
        self.write_bytes(bytes);
    }

    fn write_bytes(&self, bytes: Vec<u8>) {
        let sink = self.sink.read().clone();
        let Some(sink) = sink else {
            self.inner.lock().pending_writes.push(bytes);
            return;
        };
        // Fire-and-forget per the transport contract; failures are logged,
        // acknowledgement only ever comes from a response frame.
        tokio::spawn(async move {
            if let Err(err) = sink.write(&bytes).await {
                warn!("transport write failed: {err}");
            }
        });
    }

    fn stop_poll_loop(&self) {
        if let Some(task) = self.poll_task.lock().take() {
            task.abort();
        }
        self.inner.lock().controller.set_polling(false);
    }

    fn disconnect(&self) {
        if let Some(task) = self.tick_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.lock().take() {
            task.abort();
        }
        *self.sink.write() = None;

        let mut inner = self.inner.lock();
        inner.assembler.reset();
        inner.controller.reset();
        inner.snapshot = DeviceSnapshot::new();
        inner.pending_writes.clear();
        inner.passcode_in_flight = false;
        inner.passcode_rejected = false;
        self.set_state(&mut inner, SessionState::Disconnected);
    }

    fn surface_refusal(&self, command: Command, status: Status) {
        let reason = status.describe();
        warn!("device refused {command}: {reason}");
        {
            let mut inner = self.inner.lock();
            inner.snapshot.last_error = Some(reason.clone());
        }
        let _ = self.event_tx.send(SessionEvent::Refused { command, reason });
    }

    fn set_state(&self, inner: &mut SessionInner, state: SessionState) {
        if inner.state == state {
            return;
        }
        info!(
            "session {}: {} -> {}",
            self.config.device_identity, inner.state, state
        );
        inner.state = state;
        let _ = self.event_tx.send(SessionEvent::StateChanged(state));
    }

    fn log_wire(&self, line: String) {
        trace!("{line}");
        let _ = self.wire_log_tx.send(line);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(task) = self.tick_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.poll_task.lock().take() {
            task.abort();
        }
    }
}

// --- frame dispatch ---------------------------------------------------

fn dispatch(shared: &Arc<Shared>, frame: &Frame) {
    shared.log_wire(format!(
        "RX {} seq={} {}",
        frame.command,
        frame.sequence,
        hex_string(&frame.to_bytes())
    ));

    match frame.command {
        Command::CurrentValue => handle_current_value(shared, frame),
        Command::ReadSettings => handle_read_settings(shared, frame),
        Command::Passcode => handle_passcode_response(shared, frame),
        Command::WriteSettings | Command::StartRecording | Command::StopRecording => {
            handle_config_response(shared, frame)
        }
        Command::Unknown(raw) => {
            // Silently ignored at protocol level, but logged for the
            // diagnostics surface.
            debug!("ignoring frame with unknown command {raw:#04x}");
            shared.log_wire(format!(
                "RX unknown command {raw:#04x} payload {}",
                hex_string(&frame.payload)
            ));
        }
    }
}

/// Current-value response payload, after the status byte:
/// `[channel][RAW_LO][RAW_HI][flags]` with channel 0xFF for "none", raw
/// scaled as `(raw - 1000) / 10` degrees Celsius, flags bit 0 = recording,
/// bit 1 = security lock enabled.
fn handle_current_value(shared: &Arc<Shared>, frame: &Frame) {
    let status = Status::from_payload(&frame.payload);

    if status.is_ack() {
        if frame.payload.len() < 5 {
            shared.log_wire(format!(
                "RX current-value payload too short: {}",
                hex_string(&frame.payload)
            ));
            return;
        }
        let channel = match frame.payload[1] {
            0xFF => None,
            ch => Some(u16::from(ch)),
        };
        let raw = i16::from_le_bytes([frame.payload[2], frame.payload[3]]);
        let celsius = f64::from(i32::from(raw) - 1000) / 10.0;
        let flags = frame.payload[4];

        let snapshot = {
            let mut inner = shared.inner.lock();
            inner.snapshot.is_recording = Some(flags & 0x01 != 0);
            inner.snapshot.security_on = Some(flags & 0x02 != 0);
            inner.snapshot.clone()
        };
        let _ = shared.snapshot_tx.send(snapshot);

        let reading = TemperatureReading::new(channel, celsius, None);
        let _ = shared.reading_tx.send(reading);
        return;
    }

    if status.is_security_locked() {
        info!("device is security locked");
        let should_unlock = {
            let mut inner = shared.inner.lock();
            shared.set_state(&mut inner, SessionState::SecurityLocked);
            !inner.passcode_in_flight && !inner.passcode_rejected
        };
        shared.stop_poll_loop();
        let _ = shared.event_tx.send(SessionEvent::SecurityNeeded);

        if should_unlock {
            if let Some(code) = shared.passcodes.code_for(&shared.config.device_identity) {
                // Self-healing unlock: one automatic attempt with the known
                // code. A rejection disarms this path.
                match encode_passcode(&code) {
                    Ok(encoded) => {
                        info!("auto-submitting stored passcode");
                        shared.inner.lock().passcode_in_flight = true;
                        shared.send(Command::Passcode, &encoded);
                    }
                    Err(err) => warn!("stored passcode invalid: {err}"),
                }
            }
        }
        return;
    }

    shared.surface_refusal(Command::CurrentValue, status);
}

/// Read-settings response payload, after the status byte:
/// `[INTERVAL_LO][INTERVAL_HI][mode][flags]`, flags as in the
/// current-value response.
fn handle_read_settings(shared: &Arc<Shared>, frame: &Frame) {
    let status = Status::from_payload(&frame.payload);

    let snapshot = {
        let mut inner = shared.inner.lock();
        if status.is_ack() && frame.payload.len() >= 5 {
            let interval = u16::from_le_bytes([frame.payload[1], frame.payload[2]]);
            let mode = RecordingMode::from_raw(frame.payload[3]);
            let flags = frame.payload[4];
            inner.snapshot.interval_secs = Some(interval);
            inner.snapshot.mode = Some(mode);
            inner.snapshot.is_recording = Some(flags & 0x01 != 0);
            inner.snapshot.security_on = Some(flags & 0x02 != 0);
            inner.snapshot.last_error = None;
        } else if status.is_ack() {
            inner.snapshot.last_error = Some("settings response payload too short".to_string());
        } else {
            inner.snapshot.last_error = Some(status.describe());
        }
        inner.snapshot.clone()
    };
    let _ = shared.snapshot_tx.send(snapshot);
}

fn handle_passcode_response(shared: &Arc<Shared>, frame: &Frame) {
    let status = Status::from_payload(&frame.payload);
    {
        let mut inner = shared.inner.lock();
        inner.passcode_in_flight = false;

        if !status.is_ack() {
            // Explicitly surfaced, never retried automatically: a wrong
            // code must not be hammered against the device.
            warn!("passcode rejected: {}", status.describe());
            inner.passcode_rejected = true;
            drop(inner);
            let _ = shared.event_tx.send(SessionEvent::PasscodeRejected);
            return;
        }

        info!("passcode accepted, link unlocked");
        inner.passcode_rejected = false;
    }
    let _ = shared.event_tx.send(SessionEvent::Unlocked);
    // Ground truth may have changed while locked.
    start_poll_loop(shared);
}

/// Settings-write / start / stop share response handling: on Ack the
/// settings snapshot is re-read so the UI reflects device ground truth
/// rather than an assumed post-write state.
fn handle_config_response(shared: &Arc<Shared>, frame: &Frame) {
    let status = Status::from_payload(&frame.payload);

    if status.is_ack() {
        debug!("{} acknowledged, re-reading settings", frame.command);
        shared.send(Command::ReadSettings, &[]);
        return;
    }

    shared.surface_refusal(frame.command, status);
}

// --- timers ------------------------------------------------------------

/// Start (or restart) the 1-second polling-decision ticker. Starting a new
/// ticker cancels the previous one so ticks never duplicate. The task
/// holds only a weak reference and exits when the session is dropped.
fn start_ticker(shared: &Arc<Shared>) {
    let weak = Arc::downgrade(shared);
    let task = tokio::spawn(async move {
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tick.tick().await; // first tick fires immediately; skip it
        loop {
            tick.tick().await;
            let Some(shared) = weak.upgrade() else { break };
            run_tick(&shared);
        }
    });
    if let Some(previous) = shared.tick_task.lock().replace(task) {
        previous.abort();
    }
}

fn run_tick(shared: &Arc<Shared>) {
    let sink_ready = shared.sink.read().is_some();
    let decision = shared
        .inner
        .lock()
        .controller
        .on_tick(Instant::now(), sink_ready);

    match decision {
        Some(PollDecision::StopPolling) => {
            shared.stop_poll_loop();
            let mut inner = shared.inner.lock();
            if inner.state == SessionState::Polling {
                shared.set_state(&mut inner, SessionState::Streaming);
            }
        }
        Some(PollDecision::StartPolling) => start_poll_loop(shared),
        None => {}
    }
}

/// Start (or restart) the active poll loop at [`POLL_INTERVAL`].
fn start_poll_loop(shared: &Arc<Shared>) {
    {
        let mut inner = shared.inner.lock();
        inner.controller.set_polling(true);
        shared.set_state(&mut inner, SessionState::Polling);
    }
    let weak = Arc::downgrade(shared);
    let task = tokio::spawn(async move {
        loop {
            let Some(shared) = weak.upgrade() else { break };
            shared.send(Command::CurrentValue, &[]);
            drop(shared);
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    });
    if let Some(previous) = shared.poll_task.lock().replace(task) {
        previous.abort();
    }
}
