//! PMS7003 wire format.
//!
//! Every frame starts with the `0x42 0x4D` header and ends with a big-endian
//! 16-bit checksum equal to the wrapping sum of all preceding bytes.
//!
//! | Frame    | Length | Layout                                               |
//! |----------|--------|------------------------------------------------------|
//! | command  | 7      | header, cmd, data_hi, data_lo, checksum              |
//! | service  | 8      | header, 4-byte body, checksum                        |
//! | data     | 32     | header, length, 12 x u16 fields, 2 reserved, checksum|

use crate::error::SensorError;

use super::measurement::{FIELD_COUNT, Measurement};

pub const HEADER: [u8; 2] = [0x42, 0x4D];

pub const COMMAND_FRAME_LEN: usize = 7;
pub const SERVICE_FRAME_LEN: usize = 8;
pub const DATA_FRAME_LEN: usize = 32;

/// Value of the length word at bytes 2..4 of a data frame.
pub const DATA_FRAME_BODY_LEN: u16 = (DATA_FRAME_LEN - 4) as u16;

/// Byte offset of the first measurement field in a data frame.
const FIELDS_OFFSET: usize = 4;

/// Wrapping 16-bit sum of `bytes`.
pub const fn checksum(bytes: &[u8]) -> u16 {
    let mut sum: u16 = 0;
    let mut i = 0;
    while i < bytes.len() {
        sum = sum.wrapping_add(bytes[i] as u16);
        i += 1;
    }
    sum
}

/// True when the trailing two bytes of `frame` equal the checksum of the rest.
pub fn checksum_ok(frame: &[u8]) -> bool {
    let Some(split) = frame.len().checked_sub(2) else {
        return false;
    };
    let (body, tail) = frame.split_at(split);
    checksum(body) == u16::from_be_bytes([tail[0], tail[1]])
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Commands the driver sends to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Request one data frame (passive mode only).
    Read,
    /// Switch to passive (polled) mode.
    PassiveMode,
    /// Enter sleep mode; the fan stops.
    Sleep,
    /// Leave sleep mode; the sensor restarts in active mode.
    Wake,
}

impl Command {
    pub const ALL: [Self; 4] = [Self::Read, Self::PassiveMode, Self::Sleep, Self::Wake];

    const fn code(self) -> (u8, u16) {
        match self {
            Self::Read => (0xE2, 0x0000),
            Self::PassiveMode => (0xE1, 0x0000),
            Self::Sleep => (0xE4, 0x0000),
            Self::Wake => (0xE4, 0x0001),
        }
    }

    /// The 7-byte frame for this command.
    pub const fn frame(self) -> [u8; COMMAND_FRAME_LEN] {
        let (cmd, data) = self.code();
        let [hi, lo] = data.to_be_bytes();
        let body = [HEADER[0], HEADER[1], cmd, hi, lo];
        let [c_hi, c_lo] = checksum(&body).to_be_bytes();
        [body[0], body[1], body[2], body[3], body[4], c_hi, c_lo]
    }

    /// Identify a command frame, as seen on the wire by a simulated sensor.
    pub fn from_frame(bytes: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.frame().as_slice() == bytes)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::PassiveMode => "passive",
            Self::Sleep => "sleep",
            Self::Wake => "wake",
        }
    }
}

// ---------------------------------------------------------------------------
// Service (acknowledgment) frames
// ---------------------------------------------------------------------------

/// Mode-change acknowledgments sent by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceFrame {
    ActiveConfirm,
    PassiveConfirm,
    SleepConfirm,
}

impl ServiceFrame {
    pub const ALL: [Self; 3] = [Self::ActiveConfirm, Self::PassiveConfirm, Self::SleepConfirm];

    const fn body(self) -> [u8; 4] {
        match self {
            Self::ActiveConfirm => [0x00, 0x04, 0xE1, 0x01],
            Self::PassiveConfirm => [0x00, 0x04, 0xE1, 0x00],
            Self::SleepConfirm => [0x00, 0x04, 0xE4, 0x00],
        }
    }

    /// The complete 8-byte frame, checksum included.
    pub const fn frame(self) -> [u8; SERVICE_FRAME_LEN] {
        let b = self.body();
        let head = [HEADER[0], HEADER[1], b[0], b[1], b[2], b[3]];
        let [c_hi, c_lo] = checksum(&head).to_be_bytes();
        [head[0], head[1], head[2], head[3], head[4], head[5], c_hi, c_lo]
    }
}

/// Interpret an 8-byte prefix as a service frame. `None` when the header,
/// body or checksum does not match a known acknowledgment.
pub fn decode_service_frame(bytes: &[u8; SERVICE_FRAME_LEN]) -> Option<ServiceFrame> {
    if bytes[..2] != HEADER || !checksum_ok(bytes) {
        return None;
    }
    ServiceFrame::ALL
        .into_iter()
        .find(|s| s.body() == bytes[2..6])
}

// ---------------------------------------------------------------------------
// Data frames
// ---------------------------------------------------------------------------

/// Decode a 32-byte data frame. Only the checksum is validated.
pub fn decode_data_frame(bytes: &[u8; DATA_FRAME_LEN]) -> Result<Measurement, SensorError> {
    if !checksum_ok(bytes) {
        return Err(SensorError::Transport);
    }
    let mut fields = [0u16; FIELD_COUNT];
    for (k, field) in fields.iter_mut().enumerate() {
        let at = FIELDS_OFFSET + 2 * k;
        *field = u16::from_be_bytes([bytes[at], bytes[at + 1]]);
    }
    Ok(Measurement::from_fields(fields))
}

/// Build the data frame a sensor would send for `m`. Reserved bytes are zero.
pub fn encode_data_frame(m: &Measurement) -> [u8; DATA_FRAME_LEN] {
    let mut out = [0u8; DATA_FRAME_LEN];
    out[..2].copy_from_slice(&HEADER);
    out[2..4].copy_from_slice(&DATA_FRAME_BODY_LEN.to_be_bytes());
    for (k, v) in m.fields().into_iter().enumerate() {
        let at = FIELDS_OFFSET + 2 * k;
        out[at..at + 2].copy_from_slice(&v.to_be_bytes());
    }
    let sum = checksum(&out[..DATA_FRAME_LEN - 2]);
    out[DATA_FRAME_LEN - 2..].copy_from_slice(&sum.to_be_bytes());
    out
}
