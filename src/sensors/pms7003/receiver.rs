//! Byte-at-a-time frame accumulator.
//!
//! Runs in the UART receive context: bounded work per byte, no allocation,
//! no locks, no logging. Each completed frame is classified into an
//! [`RxFrame`] for the driver mailbox.
//!
//! The accumulator does not scan for the header. A dropped or extra byte
//! shifts the framing until the next 32-byte boundary, where the checksum
//! fails and the driver recovers.

use super::frame::{
    DATA_FRAME_LEN, SERVICE_FRAME_LEN, ServiceFrame, decode_data_frame, decode_service_frame,
};
use super::measurement::Measurement;

/// One classified inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxFrame {
    Data(Measurement),
    ActiveConfirm,
    PassiveConfirm,
    SleepConfirm,
    /// A 32-byte frame whose checksum did not validate.
    ChecksumMismatch,
}

impl RxFrame {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::ActiveConfirm => "active-confirm",
            Self::PassiveConfirm => "passive-confirm",
            Self::SleepConfirm => "sleep-confirm",
            Self::ChecksumMismatch => "checksum-mismatch",
        }
    }
}

impl From<ServiceFrame> for RxFrame {
    fn from(s: ServiceFrame) -> Self {
        match s {
            ServiceFrame::ActiveConfirm => Self::ActiveConfirm,
            ServiceFrame::PassiveConfirm => Self::PassiveConfirm,
            ServiceFrame::SleepConfirm => Self::SleepConfirm,
        }
    }
}

/// Frame buffer plus fill cursor. The cursor never exceeds 32.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    buf: [u8; DATA_FRAME_LEN],
    cursor: usize,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReceiver {
    pub const fn new() -> Self {
        Self {
            buf: [0; DATA_FRAME_LEN],
            cursor: 0,
        }
    }

    /// Number of bytes accumulated towards the current frame.
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Drop any partial frame.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Append one byte; returns the frame it completes, if any.
    pub fn push(&mut self, byte: u8) -> Option<RxFrame> {
        self.buf[self.cursor] = byte;
        self.cursor += 1;

        match self.cursor {
            SERVICE_FRAME_LEN => {
                let mut head = [0u8; SERVICE_FRAME_LEN];
                head.copy_from_slice(&self.buf[..SERVICE_FRAME_LEN]);
                // Not an acknowledgment: keep accumulating towards a data frame.
                let service = decode_service_frame(&head)?;
                self.cursor = 0;
                Some(service.into())
            }
            DATA_FRAME_LEN => {
                self.cursor = 0;
                Some(match decode_data_frame(&self.buf) {
                    Ok(m) => RxFrame::Data(m),
                    Err(_) => RxFrame::ChecksumMismatch,
                })
            }
            _ => None,
        }
    }
}
