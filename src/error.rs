//! Unified error types for the AirNode firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the boot
//! sequence and the measurement loop can handle failures uniformly. All
//! variants are `Copy` so they travel through the driver mailbox and the
//! per-caller reply channels without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The particulate sensor driver reported a failure.
    Sensor(SensorError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Failures surfaced by the PMS7003 driver.
///
/// `NotInitialized`, `InitFailed` and `QueueFull` reach API callers. The
/// remaining variants name the cause of an internal recovery and show up in
/// logs and driver statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// `measure()` was called before the driver actor was started.
    NotInitialized,
    /// No readiness acknowledgment arrived within the init timeout.
    InitFailed,
    /// The pending-reader queue is at capacity.
    QueueFull,
    /// A dequeue was attempted on an empty pending-reader queue.
    QueueEmpty,
    /// A data frame failed checksum validation.
    Transport,
    /// An event arrived that is not valid for the current protocol state.
    ProtocolViolation,
    /// The sensor did not answer an outstanding command in time.
    WatchdogTimeout,
    /// The UART rejected a write.
    Uart,
    /// Driving the reset line failed.
    ResetFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "driver not initialised"),
            Self::InitFailed => write!(f, "init acknowledgment timed out"),
            Self::QueueFull => write!(f, "reader queue full"),
            Self::QueueEmpty => write!(f, "reader queue empty"),
            Self::Transport => write!(f, "frame checksum mismatch"),
            Self::ProtocolViolation => write!(f, "unexpected event for protocol state"),
            Self::WatchdogTimeout => write!(f, "no response from sensor"),
            Self::Uart => write!(f, "UART write failed"),
            Self::ResetFailed => write!(f, "reset line write failed"),
        }
    }
}

impl std::error::Error for SensorError {}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}
