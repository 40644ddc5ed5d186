//! Port traits: the hexagonal boundary between the driver core and the
//! outside world.
//!
//! ```text
//!   UART / timer thread / mailbox ──▶ Port trait ──▶ Pms7003Driver (domain)
//! ```
//!
//! The [`Pms7003Driver`](crate::sensors::pms7003::driver::Pms7003Driver)
//! consumes these traits through generics, so the state machine never
//! touches hardware or threads directly. The actor wires the real
//! adapters; tests wire recording mocks.

use crate::config::SystemConfig;
use crate::error::SensorError;
use crate::sensors::pms7003::driver::{DriverMsg, MeasureReply};
use crate::sensors::pms7003::timers::TimerKind;

// ───────────────────────────────────────────────────────────────
// UART port (driven adapter: domain → sensor)
// ───────────────────────────────────────────────────────────────

/// Write side of the serial link to the sensor.
pub trait UartPort {
    /// Write a complete command frame.
    fn write(&mut self, bytes: &[u8]) -> Result<(), SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: domain → timer service)
// ───────────────────────────────────────────────────────────────

/// One-shot timers that post `TimerFired { timer, epoch }` back to the
/// driver when they expire.
pub trait TimerPort {
    /// Arm `timer`, replacing any pending arming of the same timer.
    fn arm(&mut self, timer: TimerKind, epoch: u32, delay_ms: u32);

    /// Cancel `timer`. A fire already posted may still arrive; the driver
    /// filters it by epoch.
    fn cancel(&mut self, timer: TimerKind);
}

// ───────────────────────────────────────────────────────────────
// Actor link (driven adapter: domain → mailbox / callers / receiver)
// ───────────────────────────────────────────────────────────────

/// Everything the state machine needs from the actor that hosts it.
/// `R` identifies a waiting caller.
pub trait ActorLink<R> {
    /// Post a message to the driver's own mailbox without blocking.
    /// Returns false when the mailbox is full.
    fn post(&mut self, msg: DriverMsg<R>) -> bool;

    /// Hand a measurement (or a rejection) to a waiting caller.
    fn deliver(&mut self, reader: R, reply: MeasureReply);

    /// Release the caller blocked in `init()`.
    fn signal_ready(&mut self);

    /// Ask the frame receiver to discard its partial frame.
    fn resync_receiver(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: firmware ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting; invalid values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration. Returns [`SystemConfig::default()`] if nothing
    /// is stored yet.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored blob failed to deserialize.
    Corrupted,
    /// A field failed validation; the message names it.
    ValidationFailed(&'static str),
    /// The storage backend failed.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
